/*!
 * Lifecycle Context
 *
 * Wraps a cancellation token with an observable state machine, three callback
 * registries and a cancel-and-wait protocol.
 *
 * # Synchronization
 *
 * One mutex guards the token, state, generation flag and registries. The
 * condvar and the async notifier are signalled by the monitor after the last
 * callback of a generation returns, so `cancel_with_wait` observes a terminal
 * state and every side effect of the callbacks.
 *
 * # Example
 *
 * ```
 * use lifecycle_ctx::{LifecycleContext, State, Token};
 * use std::sync::atomic::{AtomicUsize, Ordering};
 * use std::sync::Arc;
 *
 * let ctx = LifecycleContext::with_cancel(&Token::background()).unwrap();
 * let hits = Arc::new(AtomicUsize::new(0));
 *
 * let counter = hits.clone();
 * ctx.on_cancel(move || {
 *     counter.fetch_add(1, Ordering::SeqCst);
 * });
 *
 * ctx.cancel_with_wait();
 * assert_eq!(ctx.state(), State::Canceled);
 * assert_eq!(hits.load(Ordering::SeqCst), 1);
 * ```
 */

use super::callbacks::{Callback, CallbackCounts, CallbackKind, Registry};
use super::config::LifecycleConfig;
use super::monitor;
use super::state::State;
use crate::core::errors::{LifecycleError, LifecycleResult, TokenError};
use crate::token::{Done, Token, Trigger, Value, ValueKey};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) config: LifecycleConfig,
    pub(crate) inner: Mutex<Inner>,
    /// Signalled with `inner` held once `generation_done` flips
    pub(crate) settled: Condvar,
    pub(crate) settled_async: Notify,
}

pub(crate) struct Inner {
    pub(crate) token: Token,
    pub(crate) trigger: Trigger,
    pub(crate) state: State,
    pub(crate) generation: u64,
    /// True iff no monitor of this instance is live
    pub(crate) generation_done: bool,
    pub(crate) callbacks: Registry,
    pub(crate) monitor: Option<JoinHandle<()>>,
    pub(crate) monitor_thread: Option<ThreadId>,
}

impl Inner {
    /// Move to `next` unless that would regress the state
    pub(crate) fn advance(&mut self, next: State) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            warn!(from = %self.state, to = %next, "rejected lifecycle transition");
            false
        }
    }

    fn on_monitor_thread(&self) -> bool {
        self.monitor_thread == Some(thread::current().id())
    }
}

/// Point-in-time view of a context, for logging and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub id: Uuid,
    pub generation: u64,
    pub state: State,
    pub settled: bool,
    pub callbacks: CallbackCounts,
    pub outcome: Option<TokenError>,
}

/// Cancellation token with an observable lifecycle
///
/// Share it across threads with `Arc`. Each generation is observed by exactly
/// one monitor thread; an instance whose token never settles keeps that thread
/// parked.
pub struct LifecycleContext {
    shared: Arc<Shared>,
}

impl LifecycleContext {
    /// Derive a manually cancellable context from `parent`
    pub fn with_cancel(parent: &Token) -> LifecycleResult<Self> {
        Self::with_cancel_config(parent, LifecycleConfig::default())
    }

    pub fn with_cancel_config(parent: &Token, config: LifecycleConfig) -> LifecycleResult<Self> {
        let (token, trigger) = Token::with_cancel(parent);
        Self::launch(token, trigger, config)
    }

    /// Derive a context that reaches `Deadlined` once `timeout` elapses
    pub fn with_timeout(parent: &Token, timeout: Duration) -> LifecycleResult<Self> {
        Self::with_timeout_config(parent, timeout, LifecycleConfig::default())
    }

    pub fn with_timeout_config(
        parent: &Token,
        timeout: Duration,
        config: LifecycleConfig,
    ) -> LifecycleResult<Self> {
        let (token, trigger) = Token::with_timeout(parent, timeout)?;
        Self::launch(token, trigger, config)
    }

    /// Derive a context that reaches `Deadlined` at `deadline`
    pub fn with_deadline(parent: &Token, deadline: Instant) -> LifecycleResult<Self> {
        Self::with_deadline_config(parent, deadline, LifecycleConfig::default())
    }

    pub fn with_deadline_config(
        parent: &Token,
        deadline: Instant,
        config: LifecycleConfig,
    ) -> LifecycleResult<Self> {
        let (token, trigger) = Token::with_deadline(parent, deadline)?;
        Self::launch(token, trigger, config)
    }

    fn launch(token: Token, trigger: Trigger, config: LifecycleConfig) -> LifecycleResult<Self> {
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            config,
            inner: Mutex::new(Inner {
                token,
                trigger,
                state: State::Created,
                generation: 0,
                generation_done: false,
                callbacks: Registry::default(),
                monitor: None,
                monitor_thread: None,
            }),
            settled: Condvar::new(),
            settled_async: Notify::new(),
        });

        {
            let mut inner = shared.inner.lock();
            monitor::spawn(&shared, &mut inner)?;
        }
        Ok(Self { shared })
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Trigger cancellation without waiting for the monitor
    pub fn cancel(&self) {
        let trigger = self.shared.inner.lock().trigger.clone();
        trigger.cancel();
    }

    /// Trigger cancellation and block until the generation has settled
    ///
    /// On return the state is terminal and every applicable callback has run.
    /// On a detached clone there is no monitor to wait for, so this returns
    /// right after triggering. Called from one of this context's own callbacks
    /// it also returns right after triggering, since the monitor is the caller.
    pub fn cancel_with_wait(&self) {
        self.cancel();
        self.wait();
    }

    /// Like [`cancel_with_wait`](Self::cancel_with_wait) with an upper bound
    ///
    /// Returns `true` if the generation settled in time.
    pub fn cancel_with_wait_timeout(&self, timeout: Duration) -> bool {
        self.cancel();
        self.wait_timeout(timeout)
    }

    /// Block until the current generation has settled, without cancelling
    pub fn wait(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.on_monitor_thread() {
            warn!(context_id = %self.shared.id, "wait called from a lifecycle callback; not blocking");
            return;
        }
        while !inner.generation_done {
            self.shared.settled.wait(&mut inner);
        }
    }

    /// Block for at most `timeout`; returns whether the generation settled
    ///
    /// A timeout beyond the representable `Instant` range waits without bound.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.shared.inner.lock();
        if inner.on_monitor_thread() {
            warn!(context_id = %self.shared.id, "wait called from a lifecycle callback; not blocking");
            return inner.generation_done;
        }
        while !inner.generation_done {
            match deadline {
                Some(deadline) => {
                    if self.shared.settled.wait_until(&mut inner, deadline).timed_out() {
                        return inner.generation_done;
                    }
                }
                None => self.shared.settled.wait(&mut inner),
            }
        }
        true
    }

    /// Await the end of the current generation without blocking the executor
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.settled_async.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let done = self.shared.inner.lock().generation_done;
            if done {
                return;
            }
            notified.await;
        }
    }

    /// Trigger cancellation and await the end of the generation
    pub async fn cancel_with_wait_async(&self) {
        self.cancel();
        self.settled().await
    }

    // =========================================================================
    // Callback registration
    // =========================================================================

    /// Register a callback that runs on every termination cause
    pub fn on_done<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(CallbackKind::Done, Some(Arc::new(f)));
    }

    /// Register a callback that runs when the context is canceled
    pub fn on_cancel<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(CallbackKind::Cancel, Some(Arc::new(f)));
    }

    /// Register a callback that runs when the deadline passes
    pub fn on_timeout<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(CallbackKind::Timeout, Some(Arc::new(f)));
    }

    /// Append to a registry; `None` is a no-op
    ///
    /// Callbacks added after the generation reached a terminal state are kept
    /// (and copied by clones) but never run for that generation.
    pub fn register(&self, kind: CallbackKind, callback: Option<Callback>) {
        let Some(callback) = callback else {
            return;
        };

        let mut inner = self.shared.inner.lock();
        if inner.state.is_terminal() {
            debug!(
                context_id = %self.shared.id,
                registry = %kind,
                state = %inner.state,
                "callback registered after dispatch; it will not run this generation"
            );
        }
        inner.callbacks.push(kind, callback);
    }

    // =========================================================================
    // Reuse
    // =========================================================================

    /// Start a new generation from `parent`
    ///
    /// Registries are cleared and the state returns to `Created`. Rejected
    /// with [`LifecycleError::GenerationActive`] while the current monitor
    /// has not settled.
    pub fn reset(&self, parent: &Token) -> LifecycleResult<()> {
        self.renew(|| Ok(Token::with_cancel(parent)))
    }

    /// [`reset`](Self::reset) with a deadline-capable token
    pub fn reset_with_timeout(&self, parent: &Token, timeout: Duration) -> LifecycleResult<()> {
        self.renew(|| Ok(Token::with_timeout(parent, timeout)?))
    }

    fn renew<F>(&self, derive: F) -> LifecycleResult<()>
    where
        F: FnOnce() -> LifecycleResult<(Token, Trigger)>,
    {
        let mut inner = self.shared.inner.lock();
        if !inner.generation_done {
            return Err(LifecycleError::GenerationActive { state: inner.state });
        }

        // The monitor already flipped `generation_done` and takes no further locks
        if let Some(handle) = inner.monitor.take() {
            if handle.join().is_err() {
                warn!(context_id = %self.shared.id, generation = inner.generation, "previous monitor panicked");
            }
        }

        let (token, trigger) = derive()?;
        inner.token = token;
        inner.trigger = trigger;
        inner.state = State::Created;
        inner.callbacks.clear();
        inner.generation += 1;
        inner.generation_done = false;
        debug!(context_id = %self.shared.id, generation = inner.generation, "context reset");

        monitor::spawn(&self.shared, &mut inner)
    }

    /// Copy this context without a monitor of its own
    ///
    /// The copy shares the token and trigger, so cancelling either cancels
    /// both. It takes the current state and registries by value; its state
    /// never advances afterwards and callbacks registered on it never run.
    /// Resetting the copy detaches it completely and gives it a monitor.
    pub fn clone_detached(&self) -> Self {
        let inner = self.shared.inner.lock();
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            config: self.shared.config.clone(),
            inner: Mutex::new(Inner {
                token: inner.token.clone(),
                trigger: inner.trigger.clone(),
                state: inner.state,
                generation: inner.generation,
                generation_done: true,
                callbacks: inner.callbacks.clone(),
                monitor: None,
                monitor_thread: None,
            }),
            settled: Condvar::new(),
            settled_async: Notify::new(),
        });
        debug!(context_id = %self.shared.id, clone_id = %shared.id, "detached clone created");
        Self { shared }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> State {
        self.shared.inner.lock().state
    }

    /// Check if the state is terminal
    pub fn is_done(&self) -> bool {
        self.shared.inner.lock().state.is_terminal()
    }

    /// Handle to the current token's done signal
    pub fn done(&self) -> Done {
        self.shared.inner.lock().token.done()
    }

    /// Outcome sentinel of the current token
    pub fn err(&self) -> Option<TokenError> {
        self.shared.inner.lock().token.err()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.shared.inner.lock().token.deadline()
    }

    pub fn value<K>(&self, key: &K) -> Option<Value>
    where
        K: ValueKey,
    {
        self.shared.inner.lock().token.value(key)
    }

    pub fn value_as<T, K>(&self, key: &K) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        K: ValueKey,
    {
        self.shared.inner.lock().token.value_as(key)
    }

    /// Extend the current token's value chain in place
    pub fn with_value<K, V>(&self, key: K, value: V)
    where
        K: ValueKey,
        V: Any + Send + Sync,
    {
        let mut inner = self.shared.inner.lock();
        inner.token = inner.token.with_value(key, value);
    }

    /// The wrapped token
    pub fn token(&self) -> Token {
        self.shared.inner.lock().token.clone()
    }

    /// Manual settle function of the current token
    ///
    /// Only valid for the current generation; after a reset it no longer
    /// affects this context.
    pub fn trigger(&self) -> Trigger {
        self.shared.inner.lock().trigger.clone()
    }

    /// Generation counter, bumped by every reset
    pub fn generation(&self) -> u64 {
        self.shared.inner.lock().generation
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn callback_counts(&self) -> CallbackCounts {
        self.shared.inner.lock().callbacks.counts()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        let inner = self.shared.inner.lock();
        LifecycleSnapshot {
            id: self.shared.id,
            generation: inner.generation,
            state: inner.state,
            settled: inner.generation_done,
            callbacks: inner.callbacks.counts(),
            outcome: inner.token.err(),
        }
    }
}

impl fmt::Display for LifecycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context state: {}", self.state())
    }
}

impl fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("LifecycleContext")
            .field("id", &self.shared.id)
            .field("generation", &inner.generation)
            .field("state", &inner.state)
            .field("callbacks", &inner.callbacks)
            .finish()
    }
}
