/*!
 * Done Signal
 *
 * Single-fire broadcast event. Blocking waiters park on a parking_lot
 * condvar, async waiters on a tokio `Notify`; closing wakes both.
 */

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct Signal {
    closed: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Close the signal, waking every waiter
    ///
    /// Returns `true` only for the call that actually closed it.
    pub(crate) fn close(&self) -> bool {
        let mut closed = self.closed.lock();
        if *closed {
            return false;
        }
        *closed = true;
        self.condvar.notify_all();
        drop(closed);

        self.notify.notify_waiters();
        true
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub(crate) fn wait(&self) {
        let mut closed = self.closed.lock();
        while !*closed {
            self.condvar.wait(&mut closed);
        }
    }

    /// Wait until closed or `deadline` passes; returns whether it closed
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let mut closed = self.closed.lock();
        while !*closed {
            if self.condvar.wait_until(&mut closed, deadline).timed_out() {
                return *closed;
            }
        }
        true
    }

    pub(crate) async fn wait_async(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent close cannot slip between
            notified.as_mut().enable();

            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle to a token's done signal
///
/// Cheap to clone. Any number of handles may wait independently; all of them
/// are released by the same close event.
#[derive(Debug, Clone)]
pub struct Done {
    signal: Arc<Signal>,
}

impl Done {
    pub(crate) fn new(signal: Arc<Signal>) -> Self {
        Self { signal }
    }

    /// Check if the signal has fired
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    /// Block the calling thread until the signal fires
    pub fn wait(&self) {
        self.signal.wait();
    }

    /// Block for at most `timeout`
    ///
    /// Returns `true` if the signal fired, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.signal.wait_until(deadline),
            // Past the representable range: no bound
            None => {
                self.signal.wait();
                true
            }
        }
    }

    /// Block until the signal fires or `deadline` passes
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.signal.wait_until(deadline)
    }

    /// Await the signal without blocking the executor
    pub async fn closed(&self) {
        self.signal.wait_async().await
    }
}
