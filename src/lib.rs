/*!
 * Lifecycle Context Library
 * Cancellation tokens with an observable lifecycle and callback dispatch
 */

pub mod core;
pub mod lifecycle;
pub mod monitoring;
pub mod token;

// Re-exports
pub use crate::core::errors::*;
pub use lifecycle::{
    Callback, CallbackCounts, CallbackKind, LifecycleConfig, LifecycleContext, LifecycleSnapshot,
    State,
};
pub use monitoring::init_tracing;
pub use token::{Done, Token, Trigger};
