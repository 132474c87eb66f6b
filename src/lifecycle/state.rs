/*!
 * Lifecycle State
 *
 * Created → Running → {Canceled | Deadlined | Finished}. Terminal states are
 * absorbing until the context is reset.
 */

use super::callbacks::CallbackKind;
use crate::core::errors::TokenError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Constructed or reset; the monitor has not started yet
    Created,
    /// Monitor is waiting for the token to settle
    Running,
    /// Token settled through its trigger
    Canceled,
    /// Token's deadline passed
    Deadlined,
    /// Token settled for any other reason
    Finished,
}

impl State {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Canceled | State::Deadlined | State::Finished)
    }

    /// Check if moving to `next` keeps the state monotonic
    pub const fn can_transition_to(self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Created, State::Running)
                | (
                    State::Running,
                    State::Canceled | State::Deadlined | State::Finished
                )
        )
    }

    /// Map a token outcome to its terminal state
    ///
    /// A live token (`None`) maps to `Finished`; the monitor only classifies
    /// after the done signal fired, so that case is not expected.
    pub fn classify(outcome: Option<&TokenError>) -> State {
        match outcome {
            Some(TokenError::Canceled) => State::Canceled,
            Some(TokenError::DeadlineExceeded) => State::Deadlined,
            Some(TokenError::Custom(_)) | None => State::Finished,
        }
    }

    /// Cause-specific registry dispatched on entering this state
    pub const fn cause_callbacks(self) -> Option<CallbackKind> {
        match self {
            State::Canceled => Some(CallbackKind::Cancel),
            State::Deadlined => Some(CallbackKind::Timeout),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            State::Created => "Created",
            State::Running => "Running",
            State::Canceled => "Canceled",
            State::Deadlined => "Deadlined",
            State::Finished => "Finished",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
