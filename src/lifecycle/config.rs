/*!
 * Lifecycle Configuration
 *
 * Settings for the monitor thread that drives each generation
 */

use crate::core::limits::{MINIMAL_MONITOR_STACK_SIZE, MONITOR_THREAD_PREFIX, SLOW_CALLBACK_THRESHOLD};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Monitor threads are named `<prefix>-<generation>`
    pub thread_name_prefix: String,
    /// Monitor thread stack size; `None` keeps the platform default
    pub stack_size: Option<usize>,
    /// Callbacks slower than this are logged at WARN; `None` disables the check
    pub slow_callback_threshold: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: MONITOR_THREAD_PREFIX.to_string(),
            stack_size: None,
            slow_callback_threshold: Some(SLOW_CALLBACK_THRESHOLD),
        }
    }
}

impl LifecycleConfig {
    /// Small monitor stacks and no timing checks, for callbacks that only flip flags
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            thread_name_prefix: MONITOR_THREAD_PREFIX.to_string(),
            stack_size: Some(MINIMAL_MONITOR_STACK_SIZE),
            slow_callback_threshold: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_slow_callback_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_callback_threshold = threshold;
        self
    }

    pub(crate) fn thread_name(&self, generation: u64) -> String {
        format!("{}-{}", self.thread_name_prefix, generation)
    }
}
