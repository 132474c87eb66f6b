/*!
 * Lifecycle Contexts
 *
 * State machine, callback dispatch and cancel-and-wait protocol layered on
 * top of a cancellation token.
 *
 * # Architecture
 *
 * - **Context**: shared state behind one mutex, plus a condvar for blocking
 *   waiters and a notifier for async ones
 * - **Monitor**: one thread per generation that drives the state machine
 * - **Callbacks**: per-cause registries dispatched from a snapshot
 * - **Generations**: `reset` starts a new one only after the previous monitor settled
 */

pub mod callbacks;
pub mod config;
mod context;
mod monitor;
pub mod state;

pub use callbacks::{Callback, CallbackCounts, CallbackKind};
pub use config::LifecycleConfig;
pub use context::{LifecycleContext, LifecycleSnapshot};
pub use state::State;
