/*!
 * Cancellation Token
 *
 * Hierarchical cancellation/deadline/value carrier. Tokens are immutable
 * handles: deriving creates a new node that points at its parent.
 *
 * # Example
 *
 * ```
 * use lifecycle_ctx::token::Token;
 * use std::time::Duration;
 *
 * let (token, trigger) = Token::with_cancel(&Token::background());
 * let request = token.with_value("request_id", 42u64);
 *
 * trigger.cancel();
 * assert!(request.done().wait_timeout(Duration::from_secs(1)));
 * assert_eq!(request.value_as::<u64, _>(&"request_id").as_deref(), Some(&42));
 * ```
 */

use super::scope::Scope;
use super::signal::Done;
use super::value::{Entry, Value, ValueKey};
use crate::core::errors::{DeriveError, TokenError};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Node {
    Scope {
        scope: Arc<Scope>,
        parent: Option<Token>,
    },
    Value {
        entry: Entry,
        parent: Token,
    },
}

/// Cancellation token handle
///
/// Cloning is cheap and yields a handle to the same node.
#[derive(Clone)]
pub struct Token {
    node: Arc<Node>,
}

impl Token {
    /// The root token: never done, no deadline, no values
    pub fn background() -> Token {
        static BACKGROUND: OnceLock<Token> = OnceLock::new();
        BACKGROUND
            .get_or_init(|| Token {
                node: Arc::new(Node::Scope {
                    scope: Scope::root(),
                    parent: None,
                }),
            })
            .clone()
    }

    /// Derive a child that can be canceled manually
    pub fn with_cancel(parent: &Token) -> (Token, Trigger) {
        let scope = Scope::child(parent.scope(), None);
        Self::derived(parent, scope)
    }

    /// Derive a child that settles with `DeadlineExceeded` at `deadline`
    pub fn with_deadline(
        parent: &Token,
        deadline: Instant,
    ) -> Result<(Token, Trigger), DeriveError> {
        let scope = Scope::child(parent.scope(), Some(deadline));
        scope.arm_deadline()?;
        Ok(Self::derived(parent, scope))
    }

    /// Derive a child that settles with `DeadlineExceeded` after `timeout`
    ///
    /// A timeout beyond the representable `Instant` range adds no deadline of
    /// its own; the child still inherits the parent's.
    pub fn with_timeout(
        parent: &Token,
        timeout: Duration,
    ) -> Result<(Token, Trigger), DeriveError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(parent, deadline),
            None => Ok(Self::with_cancel(parent)),
        }
    }

    fn derived(parent: &Token, scope: Arc<Scope>) -> (Token, Trigger) {
        let token = Token {
            node: Arc::new(Node::Scope {
                scope: Arc::clone(&scope),
                parent: Some(parent.clone()),
            }),
        };
        (token, Trigger { scope })
    }

    /// Extend the value chain; the result shares cancellation with `self`
    pub fn with_value<K, V>(&self, key: K, value: V) -> Token
    where
        K: ValueKey,
        V: Any + Send + Sync,
    {
        Token {
            node: Arc::new(Node::Value {
                entry: Entry {
                    key: Box::new(key),
                    value: Arc::new(value),
                },
                parent: self.clone(),
            }),
        }
    }

    /// Nearest cancellable scope
    fn scope(&self) -> &Arc<Scope> {
        let mut token = self;
        loop {
            match token.node.as_ref() {
                Node::Scope { scope, .. } => return scope,
                Node::Value { parent, .. } => token = parent,
            }
        }
    }

    /// Handle to the done signal
    pub fn done(&self) -> Done {
        Done::new(Arc::clone(self.scope().signal()))
    }

    /// Outcome sentinel; `None` while the token is live
    pub fn err(&self) -> Option<TokenError> {
        self.scope().reason()
    }

    /// Check if the token has settled
    #[inline]
    pub fn is_done(&self) -> bool {
        self.scope().signal().is_closed()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.scope().deadline()
    }

    /// Look up the newest value stored under `key`
    pub fn value<K>(&self, key: &K) -> Option<Value>
    where
        K: ValueKey,
    {
        let key: &dyn Any = key;
        let mut token = self;
        loop {
            match token.node.as_ref() {
                Node::Value { entry, parent } => {
                    if ValueKey::matches(entry.key.as_ref(), key) {
                        return Some(Arc::clone(&entry.value));
                    }
                    token = parent;
                }
                Node::Scope { parent, .. } => match parent {
                    Some(parent) => token = parent,
                    None => return None,
                },
            }
        }
    }

    /// Typed lookup; `None` if absent or stored with another type
    pub fn value_as<T, K>(&self, key: &K) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        K: ValueKey,
    {
        self.value(key).and_then(|value| value.downcast::<T>().ok())
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::background()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("err", &self.err())
            .field("deadline", &self.deadline())
            .finish()
    }
}

/// Manual settle function paired with a derived token
#[derive(Debug, Clone)]
pub struct Trigger {
    scope: Arc<Scope>,
}

impl Trigger {
    /// Settle the token with `Canceled`
    ///
    /// Returns `false` if the token had already settled.
    pub fn cancel(&self) -> bool {
        self.scope.settle(TokenError::Canceled)
    }

    /// Settle the token with an application-defined reason
    pub fn cancel_with(&self, reason: impl Into<String>) -> bool {
        self.scope.settle(TokenError::Custom(reason.into()))
    }
}
