/*!
 * Cancellation Scope
 *
 * The cancellable node behind every derived token. A scope settles once,
 * records the reason, closes its done signal and settles its children with
 * the same reason.
 */

use super::signal::Signal;
use crate::core::errors::{DeriveError, TokenError};
use crate::core::limits::{DEADLINE_THREAD_NAME, DEADLINE_THREAD_STACK_SIZE};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;
use tracing::trace;

#[derive(Debug)]
pub(crate) struct Scope {
    signal: Arc<Signal>,
    reason: Mutex<Option<TokenError>>,
    deadline: Option<Instant>,
    children: Mutex<Vec<Weak<Scope>>>,
    /// Root scopes never settle and keep no children
    cancelable: bool,
}

impl Scope {
    pub(crate) fn root() -> Arc<Self> {
        Arc::new(Self {
            signal: Arc::new(Signal::new()),
            reason: Mutex::new(None),
            deadline: None,
            children: Mutex::new(Vec::new()),
            cancelable: false,
        })
    }

    /// Create a scope under `parent`, inheriting its outcome if already settled
    ///
    /// The effective deadline is the earlier of `deadline` and the parent's.
    pub(crate) fn child(parent: &Arc<Scope>, deadline: Option<Instant>) -> Arc<Self> {
        let deadline = match (parent.deadline, deadline) {
            (Some(inherited), Some(own)) => Some(inherited.min(own)),
            (inherited, own) => own.or(inherited),
        };

        let scope = Arc::new(Self {
            signal: Arc::new(Signal::new()),
            reason: Mutex::new(None),
            deadline,
            children: Mutex::new(Vec::new()),
            cancelable: true,
        });
        parent.adopt(&scope);
        scope
    }

    fn adopt(&self, child: &Arc<Scope>) {
        if !self.cancelable {
            return;
        }

        let mut children = self.children.lock();
        // Checked under the children lock: `settle` records its reason before
        // draining, so a child is either drained or sees the reason here.
        let settled = self.reason.lock().clone();
        match settled {
            Some(reason) => {
                drop(children);
                child.settle(reason);
            }
            None => {
                children.retain(|weak| weak.strong_count() > 0);
                children.push(Arc::downgrade(child));
            }
        }
    }

    /// Settle with `reason`; only the first call has an effect
    pub(crate) fn settle(&self, reason: TokenError) -> bool {
        if !self.cancelable {
            return false;
        }

        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
        }
        self.signal.close();
        trace!(reason = %reason, "scope settled");

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.settle(reason.clone());
        }
        true
    }

    /// Arm the deadline timer
    ///
    /// Expired deadlines settle immediately; otherwise a timer thread waits
    /// on this scope's own signal and settles it when the wait times out.
    pub(crate) fn arm_deadline(self: &Arc<Self>) -> Result<(), DeriveError> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        if self.signal.is_closed() {
            return Ok(());
        }
        if deadline <= Instant::now() {
            self.settle(TokenError::DeadlineExceeded);
            return Ok(());
        }

        let signal = Arc::clone(&self.signal);
        let scope = Arc::downgrade(self);
        thread::Builder::new()
            .name(DEADLINE_THREAD_NAME.to_string())
            .stack_size(DEADLINE_THREAD_STACK_SIZE)
            .spawn(move || {
                if !signal.wait_until(deadline) {
                    if let Some(scope) = scope.upgrade() {
                        scope.settle(TokenError::DeadlineExceeded);
                    }
                }
            })
            .map(|_| ())
            .map_err(|e| DeriveError::TimerSpawn(e.to_string()))
    }

    #[inline]
    pub(crate) fn signal(&self) -> &Arc<Signal> {
        &self.signal
    }

    #[inline]
    pub(crate) fn reason(&self) -> Option<TokenError> {
        self.reason.lock().clone()
    }

    #[inline]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.children.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_root_never_settles() {
        let root = Scope::root();
        assert!(!root.settle(TokenError::Canceled));
        assert!(root.reason().is_none());
        assert!(!root.signal().is_closed());
    }

    #[test]
    fn test_root_keeps_no_children() {
        let root = Scope::root();
        let _child = Scope::child(&root, None);
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn test_first_settle_wins() {
        let root = Scope::root();
        let scope = Scope::child(&root, None);

        assert!(scope.settle(TokenError::Canceled));
        assert!(!scope.settle(TokenError::DeadlineExceeded));
        assert_eq!(scope.reason(), Some(TokenError::Canceled));
    }

    #[test]
    fn test_settle_propagates_to_children() {
        let root = Scope::root();
        let parent = Scope::child(&root, None);
        let child = Scope::child(&parent, None);
        let grandchild = Scope::child(&child, None);

        parent.settle(TokenError::Custom("shutdown".into()));

        assert_eq!(child.reason(), Some(TokenError::Custom("shutdown".into())));
        assert_eq!(grandchild.reason(), Some(TokenError::Custom("shutdown".into())));
        assert!(grandchild.signal().is_closed());
    }

    #[test]
    fn test_child_of_settled_parent_is_settled() {
        let root = Scope::root();
        let parent = Scope::child(&root, None);
        parent.settle(TokenError::Canceled);

        let child = Scope::child(&parent, None);
        assert_eq!(child.reason(), Some(TokenError::Canceled));
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn test_dropped_children_are_pruned() {
        let root = Scope::root();
        let parent = Scope::child(&root, None);
        for _ in 0..8 {
            let _ = Scope::child(&parent, None);
        }
        let _kept = Scope::child(&parent, None);
        assert_eq!(parent.child_count(), 1);
    }

    #[test]
    fn test_deadline_inherits_earlier_parent() {
        let root = Scope::root();
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);

        let parent = Scope::child(&root, Some(soon));
        assert_eq!(Scope::child(&parent, Some(later)).deadline(), Some(soon));
        assert_eq!(Scope::child(&parent, None).deadline(), Some(soon));

        let earlier = soon - Duration::from_millis(500);
        assert_eq!(Scope::child(&parent, Some(earlier)).deadline(), Some(earlier));
    }

    #[test]
    fn test_expired_deadline_settles_immediately() {
        let root = Scope::root();
        let scope = Scope::child(&root, Some(Instant::now()));
        scope.arm_deadline().unwrap();
        assert_eq!(scope.reason(), Some(TokenError::DeadlineExceeded));
    }

    #[test]
    fn test_deadline_timer_fires() {
        let root = Scope::root();
        let scope = Scope::child(&root, Some(Instant::now() + Duration::from_millis(20)));
        scope.arm_deadline().unwrap();

        assert!(scope
            .signal()
            .wait_until(Instant::now() + Duration::from_secs(2)));
        assert_eq!(scope.reason(), Some(TokenError::DeadlineExceeded));
    }
}
