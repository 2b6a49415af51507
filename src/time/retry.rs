//! Policy-driven delayed retry.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::time::timer::IntervalTimer;

/// How the delay between attempts evolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// The delay between attempts is constant.
    Fixed,
    /// The delay grows linearly with the attempt count.
    Linear,
    /// The delay doubles with each attempt.
    Exponential,
}

/// Controls how a [`RetryExecutor`] schedules attempts.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub strategy: BackoffStrategy,
    /// Maximum number of attempts; `None` retries indefinitely.
    pub max_attempts: Option<u32>,
    /// Base delay before the first retry attempt.
    pub base_delay: Duration,
    /// Ceiling for the delay, regardless of strategy.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            strategy: BackoffStrategy::Exponential,
            max_attempts: None,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

type RetryCallback = Box<dyn FnMut() + Send + 'static>;

/// Drives repeated attempts of an operation with backoff between them.
///
/// Every computed delay `d` satisfies `min(base_delay, max_delay) <= d <=
/// max_delay`; a zero `base_delay` makes every delay zero, in which case the
/// expiration runs synchronously from `retry()`.
pub struct RetryExecutor {
    shared: Arc<Shared>,
    timer: IntervalTimer,
}

struct Shared {
    policy: RetryPolicy,
    counters: Mutex<Counters>,
    action: Mutex<Option<RetryCallback>>,
    exhausted: Mutex<Option<RetryCallback>>,
}

struct Counters {
    attempts: u32,
    canceled: bool,
}

impl RetryExecutor {
    /// Must be created from within a Tokio runtime context.
    pub fn new(policy: RetryPolicy) -> RetryExecutor {
        let shared = Arc::new(Shared {
            policy,
            counters: Mutex::new(Counters {
                attempts: 0,
                canceled: false,
            }),
            action: Mutex::new(None),
            exhausted: Mutex::new(None),
        });
        let timer = IntervalTimer::new();
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        timer
            .set_handler(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer_expired();
                }
            })
            .expect("fresh timer cannot have a handler");
        RetryExecutor { shared, timer }
    }

    /// Installs the action invoked on each expiration.
    pub fn set_retry_action<F>(&self, action: F)
    where
        F: FnMut() + Send + 'static,
    {
        *self.shared.action.lock().unwrap() = Some(Box::new(action));
    }

    /// Installs the callback invoked once after the final attempt.
    pub fn set_exhausted_callback<F>(&self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        *self.shared.exhausted.lock().unwrap() = Some(Box::new(callback));
    }

    /// Schedules the next attempt, or does nothing if cancelled or exhausted.
    pub fn retry(&self) {
        let delay = {
            let counters = self.shared.counters.lock().unwrap();
            if counters.canceled || self.shared.max_attempts_reached(counters.attempts) {
                return;
            }
            self.shared.next_delay(counters.attempts)
        };
        if delay.is_zero() {
            self.shared.on_timer_expired();
        } else {
            self.timer.schedule(delay);
        }
    }

    /// Stops the pending attempt; `retry()` does nothing until `reset()`.
    pub fn cancel(&self) {
        self.shared.counters.lock().unwrap().canceled = true;
        self.timer.cancel();
    }

    /// Cancels and rewinds the attempt counter.
    pub fn reset(&self) {
        self.timer.cancel();
        let mut counters = self.shared.counters.lock().unwrap();
        counters.attempts = 0;
        counters.canceled = false;
    }

    /// True when a finite attempt budget has been used up.
    pub fn is_exhausted(&self) -> bool {
        let counters = self.shared.counters.lock().unwrap();
        self.shared.max_attempts_reached(counters.attempts)
    }

    /// True after `cancel()` and before the next `reset()`.
    pub fn is_canceled(&self) -> bool {
        self.shared.counters.lock().unwrap().canceled
    }

    pub fn attempts(&self) -> u32 {
        self.shared.counters.lock().unwrap().attempts
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counters = self.shared.counters.lock().unwrap();
        f.debug_struct("RetryExecutor")
            .field("policy", &self.shared.policy)
            .field("attempts", &counters.attempts)
            .field("canceled", &counters.canceled)
            .finish()
    }
}

impl Shared {
    fn on_timer_expired(&self) {
        let exhausted_now = {
            let mut counters = self.counters.lock().unwrap();
            if counters.canceled {
                return;
            }
            counters.attempts += 1;
            self.max_attempts_reached(counters.attempts)
        };

        if let Some(action) = self.action.lock().unwrap().as_mut() {
            action();
        }

        if exhausted_now {
            if let Some(exhausted) = self.exhausted.lock().unwrap().as_mut() {
                exhausted();
            }
        }
    }

    fn max_attempts_reached(&self, attempts: u32) -> bool {
        // An unset budget means unlimited attempts.
        self.policy
            .max_attempts
            .map(|max| attempts >= max)
            .unwrap_or(false)
    }

    fn next_delay(&self, attempts: u32) -> Duration {
        match self.policy.strategy {
            BackoffStrategy::Fixed => self.policy.base_delay.min(self.policy.max_delay),
            BackoffStrategy::Linear => self.scaled_delay(u128::from(attempts), attempts),
            BackoffStrategy::Exponential => {
                let multiplier = if attempts >= 128 {
                    u128::MAX
                } else {
                    1u128 << attempts
                };
                self.scaled_delay(multiplier, attempts)
            }
        }
    }

    /// `base_delay * multiplier`, clamped to `max_delay`, without overflow.
    fn scaled_delay(&self, multiplier: u128, attempts: u32) -> Duration {
        let base = self.policy.base_delay;
        let max = self.policy.max_delay;

        if attempts == 0 {
            return base.min(max);
        }
        if base.is_zero() {
            return Duration::ZERO;
        }

        let nanos = match base.as_nanos().checked_mul(multiplier) {
            Some(nanos) => nanos,
            None => return max,
        };
        if nanos >= max.as_nanos() || nanos > u128::from(u64::MAX) {
            max
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(strategy: BackoffStrategy, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            strategy,
            max_attempts: None,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    fn delays(policy: &RetryPolicy, attempts: &[u32]) -> Vec<Duration> {
        let shared = Shared {
            policy: policy.clone(),
            counters: Mutex::new(Counters {
                attempts: 0,
                canceled: false,
            }),
            action: Mutex::new(None),
            exhausted: Mutex::new(None),
        };
        attempts.iter().map(|a| shared.next_delay(*a)).collect()
    }

    #[test]
    fn fixed_delay_is_clamped_base() {
        let p = policy(BackoffStrategy::Fixed, 500, 300);
        assert_eq!(
            delays(&p, &[0, 1, 5]),
            vec![Duration::from_millis(300); 3],
        );
    }

    #[test]
    fn linear_delay_grows_and_clamps() {
        let p = policy(BackoffStrategy::Linear, 100, 350);
        assert_eq!(
            delays(&p, &[0, 1, 2, 3, 4]),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(350),
            ],
        );
    }

    #[test]
    fn exponential_delay_doubles_and_clamps() {
        let p = policy(BackoffStrategy::Exponential, 100, 1000);
        assert_eq!(
            delays(&p, &[0, 1, 2, 3, 4, 63, 64, 100]),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
            ],
        );
    }

    #[test]
    fn zero_base_means_zero_delay() {
        for strategy in [
            BackoffStrategy::Fixed,
            BackoffStrategy::Linear,
            BackoffStrategy::Exponential,
        ] {
            let p = policy(strategy, 0, 30_000);
            assert_eq!(
                delays(&p, &[0, 1, 10]),
                vec![Duration::ZERO; 3],
                "strategy {:?}",
                strategy,
            );
        }
    }

    #[test]
    fn overflow_clamps_to_max_delay() {
        let p = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            max_attempts: None,
            base_delay: Duration::from_secs(u64::MAX / 2),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(delays(&p, &[u32::MAX]), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn exhaustion_fires_once_after_final_attempt() {
        let actions = Arc::new(AtomicUsize::new(0));
        let exhausted = Arc::new(AtomicUsize::new(0));
        let executor = RetryExecutor::new(RetryPolicy {
            strategy: BackoffStrategy::Fixed,
            max_attempts: Some(3),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        });
        let counted = actions.clone();
        executor.set_retry_action(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let counted = exhausted.clone();
        executor.set_exhausted_callback(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            executor.retry();
        }

        assert_eq!(actions.load(Ordering::SeqCst), 3);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
        assert!(executor.is_exhausted());

        executor.reset();
        assert_eq!(executor.attempts(), 0);
        assert!(!executor.is_exhausted());
    }

    #[tokio::test]
    async fn unlimited_budget_never_exhausts() {
        let exhausted = Arc::new(AtomicUsize::new(0));
        let executor = RetryExecutor::new(RetryPolicy {
            strategy: BackoffStrategy::Fixed,
            max_attempts: None,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        });
        executor.set_retry_action(|| {});
        let counted = exhausted.clone();
        executor.set_exhausted_callback(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..100 {
            executor.retry();
        }
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
        assert!(!executor.is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_scheduled_retry() {
        let actions = Arc::new(AtomicUsize::new(0));
        let executor = RetryExecutor::new(policy(BackoffStrategy::Fixed, 10, 10));
        let counted = actions.clone();
        executor.set_retry_action(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        executor.retry();
        executor.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(actions.load(Ordering::SeqCst), 0);

        // Still cancelled: retry() is a no-op until reset().
        executor.retry();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(actions.load(Ordering::SeqCst), 0);

        executor.reset();
        executor.retry();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(actions.load(Ordering::SeqCst), 1);
    }
}
