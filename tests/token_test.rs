/*!
 * Cancellation Token Tests
 *
 * Derivation, propagation, deadlines and the done signal
 */

use lifecycle_ctx::{Token, TokenError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_background_never_done() {
    let token = Token::background();
    assert!(!token.done().wait_timeout(Duration::from_millis(20)));
    assert!(token.err().is_none());
    assert!(token.value(&"anything").is_none());
}

#[test]
fn test_cancel_propagates_down_not_up() {
    let (parent, parent_trigger) = Token::with_cancel(&Token::background());
    let (child, child_trigger) = Token::with_cancel(&parent);
    let (sibling, _sibling_trigger) = Token::with_cancel(&parent);

    child_trigger.cancel();
    assert!(child.is_done());
    assert!(!parent.is_done());
    assert!(!sibling.is_done());

    parent_trigger.cancel();
    assert_eq!(sibling.err(), Some(TokenError::Canceled));
    // The child keeps its own first outcome
    assert_eq!(child.err(), Some(TokenError::Canceled));
}

#[test]
fn test_deadline_propagates_as_deadline() {
    let (parent, _trigger) = Token::with_timeout(&Token::background(), Duration::from_millis(20)).unwrap();
    let (child, _child_trigger) = Token::with_cancel(&parent);

    assert!(child.done().wait_timeout(Duration::from_secs(2)));
    assert_eq!(child.err(), Some(TokenError::DeadlineExceeded));
    assert_eq!(child.deadline(), parent.deadline());
}

#[test]
fn test_timeout_after_cancel_keeps_canceled() {
    let (token, trigger) = Token::with_timeout(&Token::background(), Duration::from_millis(20)).unwrap();
    trigger.cancel();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(token.err(), Some(TokenError::Canceled));
}

#[test]
fn test_deadline_value() {
    let deadline = Instant::now() + Duration::from_secs(10);
    let (token, trigger) = Token::with_deadline(&Token::background(), deadline).unwrap();
    assert_eq!(token.deadline(), Some(deadline));
    assert!(token.err().is_none());
    trigger.cancel();
}

#[test]
fn test_done_supports_independent_waiters() {
    let (token, trigger) = Token::with_cancel(&Token::background());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let done = token.done();
            thread::spawn(move || done.wait_timeout(Duration::from_secs(2)))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    assert!(trigger.cancel());

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(token.done().is_closed());
}

#[test]
fn test_values_with_struct_keys() {
    #[derive(Debug, PartialEq, Eq)]
    struct UserKey;
    #[derive(Debug, PartialEq, Eq)]
    struct TraceKey(u8);

    let token = Token::background()
        .with_value(UserKey, String::from("ada"))
        .with_value(TraceKey(1), 10u64)
        .with_value(TraceKey(2), 20u64);

    assert_eq!(
        token.value_as::<String, _>(&UserKey).as_deref().map(String::as_str),
        Some("ada")
    );
    assert_eq!(token.value_as::<u64, _>(&TraceKey(1)).as_deref(), Some(&10));
    assert_eq!(token.value_as::<u64, _>(&TraceKey(2)).as_deref(), Some(&20));
    assert!(token.value(&TraceKey(3)).is_none());
}

#[test]
fn test_token_shared_across_threads() {
    let (token, trigger) = Token::with_cancel(&Token::background());
    let token = token.with_value("shared", Arc::new(5usize));

    let handle = {
        let token = token.clone();
        thread::spawn(move || {
            token.done().wait();
            token.err()
        })
    };

    trigger.cancel();
    assert_eq!(handle.join().unwrap(), Some(TokenError::Canceled));
}

#[test]
fn test_unbounded_timeout_adds_no_deadline() {
    let (token, trigger) = Token::with_timeout(&Token::background(), Duration::MAX).unwrap();
    assert!(token.deadline().is_none());
    assert!(!token.is_done());

    trigger.cancel();
    assert!(token.done().wait_timeout(Duration::MAX));
    assert!(token.err().is_some_and(|err| err.is_canceled()));
}

#[test]
fn test_unbounded_timeout_keeps_parent_deadline() {
    let deadline = Instant::now() + Duration::from_millis(20);
    let (parent, _trigger) = Token::with_deadline(&Token::background(), deadline).unwrap();
    let (child, _child_trigger) = Token::with_timeout(&parent, Duration::MAX).unwrap();

    assert_eq!(child.deadline(), Some(deadline));
    assert!(child.done().wait_timeout(Duration::from_secs(2)));
    assert!(child.err().is_some_and(|err| err.is_deadline_exceeded()));
}

#[test]
fn test_wait_deadline() {
    let (token, trigger) = Token::with_cancel(&Token::background());
    let done = token.done();

    assert!(!done.wait_deadline(Instant::now() + Duration::from_millis(20)));

    trigger.cancel();
    assert!(done.wait_deadline(Instant::now()));
    assert!(!token.err().is_some_and(|err| err.is_deadline_exceeded()));
}
