/*!
 * Limits and Constants
 *
 * Defaults for monitor and timer threads, grouped in one place.
 */

use std::time::Duration;

// =============================================================================
// MONITOR THREADS
// =============================================================================

/// Name prefix for monitor threads; the generation number is appended
pub const MONITOR_THREAD_PREFIX: &str = "ctx-monitor";

/// Stack size used by `LifecycleConfig::minimal()` (128KB)
/// Callbacks run on the monitor thread, so the default keeps the platform size
pub const MINIMAL_MONITOR_STACK_SIZE: usize = 128 * 1024;

/// Callbacks running longer than this are reported at WARN level (100ms)
pub const SLOW_CALLBACK_THRESHOLD: Duration = Duration::from_millis(100);

// =============================================================================
// DEADLINE TIMERS
// =============================================================================

/// Name of the per-token deadline timer thread
pub const DEADLINE_THREAD_NAME: &str = "ctx-deadline";

/// Timer threads only wait and settle a scope (64KB)
pub const DEADLINE_THREAD_STACK_SIZE: usize = 64 * 1024;
