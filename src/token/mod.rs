/*!
 * Cancellation Tokens
 *
 * The building block the lifecycle layer observes:
 * - Derivation with a manual trigger or a deadline
 * - A broadcast done signal with any number of independent waiters
 * - Outcome sentinel (canceled / deadline exceeded / custom)
 * - Key/value storage and deadline introspection
 *
 * # Architecture
 *
 * Each derived token owns a `Scope`. Parents keep weak references to their
 * children and settle them with their own reason. Deadlines are enforced by a
 * timer thread per scope that waits on the scope's own signal, so it exits as
 * soon as the scope settles for any reason.
 */

mod scope;
mod signal;
mod token;
mod value;

pub use signal::Done;
pub use token::{Token, Trigger};
pub use value::{Value, ValueKey};
