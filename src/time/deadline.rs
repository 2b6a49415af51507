//! Awaiting with a deadline.
//!
//! The core transports carry no timeouts of their own; callers race any
//! operation against a timer with [`deadline`]. Whichever side finishes first
//! wins and the loser is dropped.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::time::Sleep;

use crate::{Error, Result};

/// Requires a future to complete before `duration` elapses.
pub fn deadline<F>(future: F, duration: Duration) -> Deadline<F>
where
    F: Future,
{
    Deadline {
        future,
        sleep: tokio::time::sleep(duration),
    }
}

pin_project! {
    /// Future returned by [`deadline`].
    #[must_use = "futures do nothing unless polled"]
    pub struct Deadline<F> {
        #[pin]
        future: F,
        #[pin]
        sleep: Sleep,
    }
}

impl<F> std::fmt::Debug for Deadline<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad("Deadline")
    }
}

impl<F> Future for Deadline<F>
where
    F: Future,
{
    type Output = Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(output) = this.future.poll(cx) {
            return Poll::Ready(Ok(output));
        }
        match this.sleep.poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(Error::new_timeout())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let out = deadline(async { 7u32 }, Duration::from_secs(1)).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_yields_timeout() {
        let never = std::future::pending::<()>();
        let err = deadline(never, Duration::from_millis(5)).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
