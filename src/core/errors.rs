/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::lifecycle::State;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome sentinel reported by a settled token
///
/// `None` (the absence of a `TokenError`) means the token is still live.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum TokenError {
    #[error("context canceled")]
    #[diagnostic(
        code(token::canceled),
        help("The token or one of its ancestors was canceled through its trigger.")
    )]
    Canceled,

    #[error("context deadline exceeded")]
    #[diagnostic(
        code(token::deadline_exceeded),
        help("The token's deadline (or an ancestor's) passed before the work completed.")
    )]
    DeadlineExceeded,

    #[error("context finished: {0}")]
    #[diagnostic(
        code(token::custom),
        help("The token was settled with an application-defined reason.")
    )]
    Custom(String),
}

impl TokenError {
    /// Check whether this is the manual-cancellation sentinel
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, TokenError::Canceled)
    }

    /// Check whether this is the deadline sentinel
    #[inline]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, TokenError::DeadlineExceeded)
    }
}

/// Token derivation errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DeriveError {
    #[error("Failed to spawn deadline timer: {0}")]
    #[diagnostic(
        code(token::timer_spawn_failed),
        help("The OS refused to create the timer thread. Check thread limits.")
    )]
    TimerSpawn(String),
}

/// Lifecycle context errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LifecycleError {
    #[error("Generation still active in state {state}")]
    #[diagnostic(
        code(lifecycle::generation_active),
        help("Reset requires a terminal state. Cancel the context and wait for it to settle first.")
    )]
    GenerationActive { state: State },

    #[error("Failed to spawn monitor thread: {0}")]
    #[diagnostic(
        code(lifecycle::monitor_spawn_failed),
        help("The OS refused to create the monitor thread. Check thread limits and stack size.")
    )]
    MonitorSpawn(String),

    #[error("Token derivation failed: {0}")]
    #[diagnostic(transparent)]
    Derive(#[from] DeriveError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        assert_eq!(TokenError::Canceled.to_string(), "context canceled");
        assert_eq!(
            TokenError::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
        assert_eq!(
            TokenError::Custom("drained".into()).to_string(),
            "context finished: drained"
        );
    }

    #[test]
    fn test_lifecycle_error_serialization() {
        let err = LifecycleError::GenerationActive {
            state: State::Running,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("generation_active"));
        assert!(json.contains("running"));

        let back: LifecycleError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_derive_error_converts() {
        let err: LifecycleError = DeriveError::TimerSpawn("EAGAIN".into()).into();
        assert!(matches!(err, LifecycleError::Derive(_)));
        assert!(err.to_string().contains("EAGAIN"));
    }
}
