//! Growable pool of send buffers.
//!
//! HTTP framing produces many small, short-lived send chunks. Recycling the
//! backing vectors between sends amortizes allocation across the life of a
//! socket.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, Weak};

/// A growable pool of byte vectors, each kept reserved to a minimum capacity.
pub(crate) struct Arena {
    inner: Arc<Inner>,
}

struct Inner {
    reserve: usize,
    pool: Mutex<Vec<Vec<u8>>>,
}

impl Arena {
    /// Creates an arena pre-populated with `initial_count` vectors reserved to
    /// `reserve` bytes each.
    pub(crate) fn new(initial_count: usize, reserve: usize) -> Arena {
        let mut pool = Vec::with_capacity(initial_count);
        for _ in 0..initial_count {
            pool.push(Vec::with_capacity(reserve));
        }
        Arena {
            inner: Arc::new(Inner {
                reserve,
                pool: Mutex::new(pool),
            }),
        }
    }

    /// Borrows a buffer sized to exactly `len` bytes.
    pub(crate) fn acquire(&self, len: usize) -> ArenaBuf {
        let mut vec = self.inner.pool.lock().unwrap().pop().unwrap_or_default();
        vec.clear();
        vec.reserve(self.inner.reserve.max(len));
        vec.resize(len, 0);
        ArenaBuf {
            vec: Some(vec),
            arena: Arc::downgrade(&self.inner),
        }
    }

    /// Borrows a buffer holding a copy of `data`.
    pub(crate) fn acquire_from(&self, data: &[u8]) -> ArenaBuf {
        let mut buf = self.acquire(data.len());
        buf.copy_from_slice(data);
        buf
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.inner.pool.lock().unwrap().len()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("reserve", &self.inner.reserve)
            .finish()
    }
}

/// A byte buffer borrowed from an [`Arena`].
///
/// Dropping the buffer returns it to the arena; if the arena is already gone
/// the backing vector is simply freed.
pub(crate) struct ArenaBuf {
    vec: Option<Vec<u8>>,
    arena: Weak<Inner>,
}

impl Deref for ArenaBuf {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.vec.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for ArenaBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.vec.as_deref_mut().unwrap_or(&mut [])
    }
}

impl fmt::Debug for ArenaBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBuf").field("len", &self.len()).finish()
    }
}

impl Drop for ArenaBuf {
    fn drop(&mut self) {
        if let Some(vec) = self.vec.take() {
            if let Some(arena) = self.arena.upgrade() {
                arena.pool.lock().unwrap().push(vec);
            }
        }
    }
}
