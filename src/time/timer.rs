//! One-shot and periodic scheduling on the runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{Error, Result};

type TimerHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// An interval timer with a single callback slot.
///
/// The handler is installed once; scheduling may be repeated. Periodic
/// expirations re-arm from the previous deadline, so intervals do not drift
/// with handler run time. `cancel` suppresses an in-flight expiration.
///
/// Must be created from within a Tokio runtime context.
pub struct IntervalTimer {
    inner: Arc<Inner>,
}

struct Inner {
    rt: Handle,
    state: Mutex<State>,
}

struct State {
    handler: Option<TimerHandler>,
    // Bumped by every schedule/cancel; stale expirations check it and bail.
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl IntervalTimer {
    pub fn new() -> IntervalTimer {
        IntervalTimer {
            inner: Arc::new(Inner {
                rt: Handle::current(),
                state: Mutex::new(State {
                    handler: None,
                    epoch: 0,
                    task: None,
                }),
            }),
        }
    }

    /// Installs the expiration handler. Installing a second handler is a
    /// caller bug and returns an error, leaving the first in place.
    pub fn set_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        if state.handler.is_some() {
            return Err(Error::new_handler_already_set());
        }
        state.handler = Some(Arc::new(handler));
        Ok(())
    }

    /// Arms a one-shot expiration `delay` from now.
    pub fn schedule(&self, delay: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        state.epoch += 1;
        let epoch = state.epoch;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        let inner = self.inner.clone();
        state.task = Some(self.inner.rt.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.expire(epoch);
        }));
    }

    /// Arms a periodic expiration every `interval`.
    pub fn schedule_periodic(&self, interval: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        state.epoch += 1;
        let epoch = state.epoch;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        let inner = self.inner.clone();
        state.task = Some(self.inner.rt.spawn(async move {
            let mut deadline = Instant::now() + interval;
            loop {
                tokio::time::sleep_until(deadline).await;
                if !inner.expire(epoch) {
                    // Cancelled or rescheduled, possibly from within the
                    // handler itself.
                    return;
                }
                deadline += interval;
            }
        }));
    }

    /// Cancels the armed expiration, if any.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.epoch += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        IntervalTimer::new()
    }
}

impl std::fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("IntervalTimer")
            .field("armed", &state.task.is_some())
            .finish()
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Inner {
    /// Runs the handler for `epoch`. Returns false if the expiration became
    /// stale, before or during the handler call.
    fn expire(&self, epoch: u64) -> bool {
        let handler = {
            let state = self.state.lock().unwrap();
            if state.epoch != epoch {
                return false;
            }
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler();
        }
        self.state.lock().unwrap().epoch == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let timer = IntervalTimer::new();
        let counted = hits.clone();
        timer
            .set_handler(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        timer.schedule(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_fires_repeatedly() {
        let hits = Arc::new(AtomicUsize::new(0));
        let timer = IntervalTimer::new();
        let counted = hits.clone();
        timer
            .set_handler(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        timer.schedule_periodic(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        timer.cancel();
        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected >= 3 expirations, saw {}", seen);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_pending_expiration() {
        let hits = Arc::new(AtomicUsize::new(0));
        let timer = IntervalTimer::new();
        let counted = hits.clone();
        timer
            .set_handler(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        timer.schedule(Duration::from_millis(10));
        timer.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_handler_is_refused() {
        let timer = IntervalTimer::new();
        timer.set_handler(|| {}).unwrap();
        let err = timer.set_handler(|| {}).unwrap_err();
        assert!(err.is_user());
    }
}
