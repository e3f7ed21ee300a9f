//! Cancellation and deadlines for model sweeps.
//!
//! [`CancellationToken`] is a thread-safe flag the caller can flip from any
//! thread. [`StopCondition`] pairs an optional token with an optional wall-clock
//! deadline and is checked by the sweep before each model starts, so a model
//! already fitting always runs to completion.
//!
//! # Example
//!
//! ```
//! use prepflow_learning::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//!
//! token.cancel();
//! assert!(token.is_cancelled());
//!
//! token.reset();
//! assert!(!token.is_cancelled());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{LearningError, Result};

/// A token that can be used to signal cancellation of a sweep.
///
/// Clones share the same flag, so a clone handed to another thread can
/// cancel the sweep running on this one.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

// Sweeps run models on rayon workers, which all observe the same token.
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    /// Creates a new token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Models that have not started yet are skipped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another sweep.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns a closure that reports whether cancellation was requested.
    pub fn as_check_fn(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let cancelled = self.cancelled.clone();
        move || cancelled.load(Ordering::SeqCst)
    }
}

/// Combined cancellation token and deadline, evaluated between models.
#[derive(Debug, Clone, Default)]
pub struct StopCondition {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

static_assertions::assert_impl_all!(StopCondition: Send, Sync);

impl StopCondition {
    /// Build a stop condition starting now.
    ///
    /// `budget` is measured from the moment this is called.
    #[must_use]
    pub fn new(token: Option<CancellationToken>, budget: Option<Duration>) -> Self {
        Self {
            token,
            deadline: budget.map(|b| Instant::now() + b),
        }
    }

    /// A condition that never stops.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Returns `Err(Cancelled)` or `Err(DeadlineExceeded)` if the sweep must stop.
    ///
    /// Cancellation wins over the deadline when both apply.
    pub fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(LearningError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LearningError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_as_check_fn() {
        let token = CancellationToken::new();
        let check = token.as_check_fn();
        assert!(!check());
        token.cancel();
        assert!(check());
    }

    #[test]
    fn test_cancellation_token_thread_safe() {
        use std::thread;

        let token = CancellationToken::new();
        let token_clone = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token_clone.cancel();
        });

        for _ in 0..200 {
            if token.is_cancelled() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        handle.join().unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_stop_condition_never() {
        assert!(StopCondition::never().check().is_ok());
    }

    #[test]
    fn test_stop_condition_cancelled() {
        let token = CancellationToken::new();
        let stop = StopCondition::new(Some(token.clone()), None);
        assert!(stop.check().is_ok());

        token.cancel();
        assert!(matches!(stop.check(), Err(LearningError::Cancelled)));
    }

    #[test]
    fn test_stop_condition_deadline() {
        let stop = StopCondition::new(None, Some(Duration::ZERO));
        assert!(matches!(stop.check(), Err(LearningError::DeadlineExceeded)));

        let stop = StopCondition::new(None, Some(Duration::from_secs(3600)));
        assert!(stop.check().is_ok());
    }

    #[test]
    fn test_cancel_takes_precedence_over_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let stop = StopCondition::new(Some(token), Some(Duration::ZERO));
        assert!(matches!(stop.check(), Err(LearningError::Cancelled)));
    }
}
