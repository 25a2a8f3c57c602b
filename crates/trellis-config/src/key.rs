// Configuration keys.
//
// A key's identity is a process-unique counter value allocated at construction
// time, never its display name: two keys created with the same name are
// distinct, and a cloned key is the same key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u64);

impl KeyId {
    fn fresh() -> Self {
        KeyId(NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.0)
    }
}

/// A typed configuration key with an explicit display name and an optional
/// default value.
///
/// Cloning a `Key` shares the underlying identity, so clones resolve to the
/// same chain entries. The name is carried for diagnostics only.
pub struct Key<T> {
    inner: Arc<KeyInner<T>>,
}

struct KeyInner<T> {
    id: KeyId,
    name: String,
    default: Option<T>,
}

impl<T: Clone + Send + Sync + 'static> Key<T> {
    /// Create a key with no default; resolving it through a chain that does
    /// not map it is an error.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Create a key that falls back to `default` when no layer maps it.
    pub fn with_default(name: impl Into<String>, default: T) -> Self {
        Self::build(name.into(), Some(default))
    }

    fn build(name: String, default: Option<T>) -> Self {
        Key {
            inner: Arc::new(KeyInner {
                id: KeyId::fresh(),
                name,
                default,
            }),
        }
    }

    /// The key's process-unique identity.
    pub fn id(&self) -> KeyId {
        self.inner.id
    }

    /// Display name supplied at construction time.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The declared default value, if any.
    pub fn default(&self) -> Option<T> {
        self.inner.default.clone()
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Key {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}, {})", self.inner.name, self.inner.id)
    }
}
