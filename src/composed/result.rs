//! # Control Results
//!
//! The outcome vocabulary every action speaks.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Unexpected failure raised by an action
#[derive(Debug, Error)]
pub enum ActionError {
    /// The invocation's cancellation token fired
    #[error("reconciliation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(StoreError),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => Self::Cancelled,
            err => Self::Store(err),
        }
    }
}

/// Control signal returned by every action
///
/// Anything but `Continue` ends the enclosing composition and bubbles up to the
/// caller unchanged.
#[derive(Debug)]
#[must_use]
pub enum ControlResult {
    /// Proceed with the next action
    Continue,
    /// Pipeline ends, nothing to retry
    StopAndForget,
    /// Pipeline ends, reschedule immediately
    StopWithRequeue,
    /// Pipeline ends, reschedule after the delay
    StopWithRequeueDelay(Duration),
    /// Unexpected failure; the scheduler's error policy decides on the retry
    Fail(ActionError),
}

impl ControlResult {
    pub fn fail(err: impl Into<ActionError>) -> Self {
        Self::Fail(err.into())
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Requested requeue delay, `Some(ZERO)` for an immediate requeue
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            Self::StopWithRequeue => Some(Duration::ZERO),
            Self::StopWithRequeueDelay(delay) => Some(*delay),
            _ => None,
        }
    }
}

impl fmt::Display for ControlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("Continue"),
            Self::StopAndForget => f.write_str("StopAndForget"),
            Self::StopWithRequeue => f.write_str("StopWithRequeue"),
            Self::StopWithRequeueDelay(delay) => write!(f, "StopWithRequeueDelay({delay:?})"),
            Self::Fail(err) => write!(f, "Fail({err})"),
        }
    }
}
