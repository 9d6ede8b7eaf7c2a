//! Per-call execution context.
//!
//! # Responsibility
//! - Carry cancellation and deadline state through one call chain.
//! - Mark contexts derived for a running transaction.
//!
//! # Invariants
//! - Clones share one cancellation flag; cancelling any clone cancels all.
//! - `check()` must be called before every store and resolver call.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reason a call chain was interrupted before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The caller cancelled the call.
    Cancelled,
    /// The call deadline passed.
    DeadlineExceeded,
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "call cancelled"),
            Self::DeadlineExceeded => write!(f, "call deadline exceeded"),
        }
    }
}

impl Error for ContextError {}

/// Cancellation/deadline carrier passed down every repository call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    in_transaction: bool,
}

impl CallContext {
    /// Returns a context with no deadline that is never cancelled unless
    /// `cancel()` is called.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a copy whose deadline is `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy with the earlier of the current and given deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Cancels this context and every clone sharing its flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether this context belongs to a running unit of work.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Fails when the call was cancelled or its deadline passed.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub(crate) fn for_transaction(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: self.deadline,
            in_transaction: true,
        }
    }
}
