/*!
 * Core Module
 * Error types and crate-wide limits
 */

pub mod errors;
pub mod limits;

// Re-export for convenience
pub use errors::*;
