//! Observer plumbing shared by the socket types.
//!
//! Background tasks hold back-references to handlers whose owners may drop at
//! any time; late firings must become no-ops instead of use-after-free. The
//! outer handle owns the strong reference and its `Drop` flips the flag — no
//! explicit invalidation call exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Holds a socket's observer and serializes callback invocations.
///
/// Invariants:
/// - at most one callback runs at a time (the slot lock is held for the call);
/// - after `detach()` no further callback runs;
/// - `fire_last` consumes the handler, releasing a self-owning observer.
pub(crate) struct HandlerSlot<H: ?Sized> {
    detached: AtomicBool,
    slot: Mutex<Option<Box<H>>>,
}

impl<H: ?Sized> HandlerSlot<H> {
    pub(crate) fn new(handler: Box<H>) -> HandlerSlot<H> {
        HandlerSlot {
            detached: AtomicBool::new(false),
            slot: Mutex::new(Some(handler)),
        }
    }

    pub(crate) fn empty() -> HandlerSlot<H> {
        HandlerSlot {
            detached: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn install(&self, handler: Box<H>) {
        *self.slot.lock().unwrap() = Some(handler);
    }

    /// Silences the slot. Does not take the slot lock, so it is safe to call
    /// from within a running callback (e.g. a handler dropping its own
    /// socket handle).
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Invokes `f` on the handler, if one is installed and not detached.
    pub(crate) fn fire(&self, f: impl FnOnce(&mut H)) {
        if self.detached.load(Ordering::Acquire) {
            return;
        }
        let mut slot = self.slot.lock().unwrap();
        if self.detached.load(Ordering::Acquire) {
            return;
        }
        if let Some(handler) = slot.as_mut() {
            f(handler);
        }
    }

    /// Invokes `f` as the final event and drops the handler afterwards.
    pub(crate) fn fire_last(&self, f: impl FnOnce(&mut H)) {
        let handler = self.slot.lock().unwrap().take();
        if let Some(mut handler) = handler {
            if !self.detached.load(Ordering::Acquire) {
                f(&mut handler);
            }
        }
    }
}

/// A back-reference to a shared handler that expires when its owner drops.
pub(crate) struct ExpiringRef<H: ?Sized> {
    cell: Weak<Mutex<H>>,
}

impl<H: ?Sized> ExpiringRef<H> {
    pub(crate) fn new(strong: &Arc<Mutex<H>>) -> ExpiringRef<H> {
        ExpiringRef {
            cell: Arc::downgrade(strong),
        }
    }

    /// Upgrades and invokes `f`; returns `None` if the handler expired.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        let strong = self.cell.upgrade()?;
        let mut guard = strong.lock().unwrap();
        Some(f(&mut guard))
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl<H: ?Sized> Clone for ExpiringRef<H> {
    fn clone(&self) -> Self {
        ExpiringRef {
            cell: self.cell.clone(),
        }
    }
}
