/*!
 * Callback Registries
 *
 * Append-only callback lists per termination cause, plus the isolated
 * dispatch loop the monitor runs over a snapshot of them.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Zero-argument lifecycle callback
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Which registry a callback belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// Runs on every termination cause, after the cause-specific pass
    Done,
    Cancel,
    Timeout,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallbackKind::Done => "on_done",
            CallbackKind::Cancel => "on_cancel",
            CallbackKind::Timeout => "on_timeout",
        })
    }
}

/// Registry sizes at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackCounts {
    pub on_done: usize,
    pub on_cancel: usize,
    pub on_timeout: usize,
}

impl CallbackCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.on_done + self.on_cancel + self.on_timeout
    }
}

#[derive(Clone, Default)]
pub(crate) struct Registry {
    on_done: Vec<Callback>,
    on_cancel: Vec<Callback>,
    on_timeout: Vec<Callback>,
}

impl Registry {
    fn list_mut(&mut self, kind: CallbackKind) -> &mut Vec<Callback> {
        match kind {
            CallbackKind::Done => &mut self.on_done,
            CallbackKind::Cancel => &mut self.on_cancel,
            CallbackKind::Timeout => &mut self.on_timeout,
        }
    }

    pub(crate) fn push(&mut self, kind: CallbackKind, callback: Callback) {
        self.list_mut(kind).push(callback);
    }

    /// Copy of one registry; later registrations do not affect it
    pub(crate) fn snapshot(&self, kind: CallbackKind) -> Vec<Callback> {
        match kind {
            CallbackKind::Done => self.on_done.clone(),
            CallbackKind::Cancel => self.on_cancel.clone(),
            CallbackKind::Timeout => self.on_timeout.clone(),
        }
    }

    pub(crate) fn counts(&self) -> CallbackCounts {
        CallbackCounts {
            on_done: self.on_done.len(),
            on_cancel: self.on_cancel.len(),
            on_timeout: self.on_timeout.len(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.on_done.clear();
        self.on_cancel.clear();
        self.on_timeout.clear();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Registry").field(&self.counts()).finish()
    }
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DispatchReport {
    pub(crate) invoked: usize,
    pub(crate) panicked: usize,
}

/// Run `callbacks` in order, one at a time
///
/// Each invocation is isolated: a panicking callback is logged and the next
/// one still runs.
pub(crate) fn dispatch(
    kind: CallbackKind,
    callbacks: &[Callback],
    slow_threshold: Option<Duration>,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (index, callback) in callbacks.iter().enumerate() {
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| callback()));
        let elapsed = start.elapsed();
        report.invoked += 1;

        if let Err(payload) = result {
            report.panicked += 1;
            error!(
                registry = %kind,
                index,
                panic = panic_message(payload.as_ref()),
                "lifecycle callback panicked"
            );
        }

        if slow_threshold.is_some_and(|threshold| elapsed > threshold) {
            warn!(
                registry = %kind,
                index,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow lifecycle callback"
            );
        }
    }

    report
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<usize>>>, n: usize) -> Callback {
        let log = log.clone();
        Arc::new(move || log.lock().push(n))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let callbacks: Vec<Callback> = (0..5).map(|n| recorder(&log, n)).collect();

        let report = dispatch(CallbackKind::Done, &callbacks, None);

        assert_eq!(report.invoked, 5);
        assert_eq!(report.panicked, 0);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let callbacks: Vec<Callback> = vec![
            recorder(&log, 0),
            Arc::new(|| panic!("callback failure")),
            recorder(&log, 2),
        ];

        let report = dispatch(CallbackKind::Cancel, &callbacks, None);

        assert_eq!(report.invoked, 3);
        assert_eq!(report.panicked, 1);
        assert_eq!(*log.lock(), vec![0, 2]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::default();
        registry.push(CallbackKind::Timeout, recorder(&log, 1));

        let snapshot = registry.snapshot(CallbackKind::Timeout);
        registry.push(CallbackKind::Timeout, recorder(&log, 2));
        registry.clear();

        dispatch(CallbackKind::Timeout, &snapshot, None);
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(registry.counts().total(), 0);
    }

    #[test]
    fn test_counts_per_kind() {
        let mut registry = Registry::default();
        registry.push(CallbackKind::Done, Arc::new(|| {}));
        registry.push(CallbackKind::Done, Arc::new(|| {}));
        registry.push(CallbackKind::Cancel, Arc::new(|| {}));

        assert_eq!(
            registry.counts(),
            CallbackCounts {
                on_done: 2,
                on_cancel: 1,
                on_timeout: 0,
            }
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
