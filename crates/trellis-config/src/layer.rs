// Override layers.
//
// A layer is one override unit: an explicit ordered list of (key, resolver)
// entries tested in order during lookup. Values are type-erased behind
// `Box<dyn Any>` inside the chain and recovered through the typed `Key` at the
// lookup site, the same erasure trick the node arena uses for typed nodes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::chain::View;
use crate::key::{Key, KeyId};

type ErasedValue = Box<dyn Any + Send + Sync>;
type Resolver = Arc<dyn Fn(&View, &View, &View) -> ErasedValue + Send + Sync>;

pub(crate) struct Entry {
    pub(crate) key: KeyId,
    pub(crate) resolver: Resolver,
}

/// One override unit in a configuration chain.
///
/// Entries are consulted in the order they were added to the builder; the
/// first entry matching the looked-up key wins within the layer.
pub struct Layer {
    pub(crate) entries: Vec<Entry>,
}

impl Layer {
    /// Start building a layer.
    pub fn builder() -> LayerBuilder {
        LayerBuilder {
            entries: Vec::new(),
        }
    }

    /// A layer mapping nothing; useful as a neutral element when composing.
    pub fn empty() -> Layer {
        Layer {
            entries: Vec::new(),
        }
    }

    pub(crate) fn lookup(&self, key: KeyId) -> Option<&Resolver> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.resolver)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Builder collecting the ordered entries of a [`Layer`].
pub struct LayerBuilder {
    entries: Vec<Entry>,
}

impl LayerBuilder {
    /// Map `key` to a constant value.
    pub fn set<T: Clone + Send + Sync + 'static>(mut self, key: &Key<T>, value: T) -> Self {
        self.entries.push(Entry {
            key: key.id(),
            resolver: Arc::new(move |_site, _here, _up| Box::new(value.clone())),
        });
        self
    }

    /// Map `key` to a value computed from the three lookup views.
    ///
    /// The resolver receives the **site** view (lookup restarting at the
    /// outermost layer of the whole chain), the **here** view (this layer
    /// only), and the **up** view (lookup continuing after this layer).
    /// Querying the same key back through `here` recurses without bound; that
    /// is a caller defect, not a guarded condition.
    pub fn bind<T, F>(mut self, key: &Key<T>, f: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&View, &View, &View) -> T + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            key: key.id(),
            resolver: Arc::new(move |site, here, up| Box::new(f(site, here, up))),
        });
        self
    }

    /// Finish the layer.
    pub fn build(self) -> Layer {
        Layer {
            entries: self.entries,
        }
    }
}
