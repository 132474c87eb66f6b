/*!
 * Value Keys
 *
 * Type-erased keys for the token value chain. Keys compare equal only when
 * they have the same concrete type and `PartialEq` says so, so `"id"` and
 * `String::from("id")` are distinct keys.
 */

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Value stored in a token
pub type Value = Arc<dyn Any + Send + Sync>;

/// Key usable with [`Token::with_value`](super::Token::with_value)
///
/// Implemented for every `'static + Eq + Debug + Send + Sync` type.
pub trait ValueKey: Send + Sync + fmt::Debug + 'static {
    /// Compare against a key of unknown type
    fn matches(&self, other: &dyn Any) -> bool;
}

impl<K> ValueKey for K
where
    K: Any + Eq + fmt::Debug + Send + Sync,
{
    #[inline]
    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<K>().is_some_and(|other| other == self)
    }
}

pub(crate) struct Entry {
    pub(crate) key: Box<dyn ValueKey>,
    pub(crate) value: Value,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("key", &self.key).finish_non_exhaustive()
    }
}
