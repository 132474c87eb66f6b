/*!
 * Generation Monitor
 *
 * One thread per generation. It marks the context Running, blocks on the
 * token's done signal, classifies the outcome, dispatches callbacks from a
 * snapshot and finally releases every waiter.
 */

use super::callbacks::{dispatch, CallbackKind};
use super::context::{Inner, Shared};
use super::state::State;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::token::Token;
use std::sync::Arc;
use std::thread;
use tracing::{debug, debug_span, error};

/// Spawn the monitor for the generation currently stored in `inner`
///
/// Called with the state lock held; the new thread blocks on that lock until
/// the caller releases it.
pub(crate) fn spawn(shared: &Arc<Shared>, inner: &mut Inner) -> LifecycleResult<()> {
    let generation = inner.generation;
    let token = inner.token.clone();
    let monitor_shared = Arc::clone(shared);

    let mut builder = thread::Builder::new().name(shared.config.thread_name(generation));
    if let Some(bytes) = shared.config.stack_size {
        builder = builder.stack_size(bytes);
    }

    match builder.spawn(move || run(&monitor_shared, token, generation)) {
        Ok(handle) => {
            inner.monitor_thread = Some(handle.thread().id());
            inner.monitor = Some(handle);
            debug!(context_id = %shared.id, generation, "monitor started");
            Ok(())
        }
        Err(e) => {
            // No monitor for this generation, so nothing will ever settle it
            inner.generation_done = true;
            error!(context_id = %shared.id, generation, error = %e, "failed to spawn monitor");
            Err(LifecycleError::MonitorSpawn(e.to_string()))
        }
    }
}

fn run(shared: &Shared, token: Token, generation: u64) {
    let span = debug_span!("monitor", context_id = %shared.id, generation);
    let _entered = span.enter();

    shared.inner.lock().advance(State::Running);

    token.done().wait();

    let outcome = token.err();
    let (state, cause, on_done) = {
        let mut inner = shared.inner.lock();
        debug_assert_eq!(inner.generation, generation);

        let state = State::classify(outcome.as_ref());
        inner.advance(state);

        let cause = state
            .cause_callbacks()
            .map(|kind| (kind, inner.callbacks.snapshot(kind)));
        (state, cause, inner.callbacks.snapshot(CallbackKind::Done))
    };
    debug!(%state, outcome = ?outcome, "token settled");

    let threshold = shared.config.slow_callback_threshold;
    if let Some((kind, callbacks)) = cause {
        let report = dispatch(kind, &callbacks, threshold);
        debug!(registry = %kind, invoked = report.invoked, panicked = report.panicked, "dispatched");
    }
    let report = dispatch(CallbackKind::Done, &on_done, threshold);
    debug!(registry = %CallbackKind::Done, invoked = report.invoked, panicked = report.panicked, "dispatched");

    let mut inner = shared.inner.lock();
    inner.generation_done = true;
    inner.monitor_thread = None;
    shared.settled.notify_all();
    drop(inner);

    shared.settled_async.notify_waiters();
    debug!("generation settled");
}
