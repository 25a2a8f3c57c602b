// Persistent configuration chains and lookup views.
//
// A chain is an Arc-linked list of layers; composing never copies or mutates,
// it only allocates a new head link. Lookup walks the links front-to-back
// (front = most overriding). When a layer's entry is a computed resolver it
// receives three restart points:
//
//   site - the outermost layer of the entire chain
//   here - the matched layer alone
//   up   - the link strictly after the matched layer
//
// Swapping site and up does not crash, it silently resolves against the wrong
// end of the chain; the tests in tests/chain_tests.rs pin the distinction.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};
use crate::key::Key;
use crate::layer::Layer;

pub(crate) struct Link {
    layer: Arc<Layer>,
    next: Option<Arc<Link>>,
}

/// An immutable, persistent chain of configuration layers.
#[derive(Clone, Default)]
pub struct Config {
    head: Option<Arc<Link>>,
}

impl Config {
    /// The empty chain; every lookup falls through to the key's default.
    pub fn new() -> Self {
        Config { head: None }
    }

    /// Compose `layer` in front of this chain. O(1); the receiver is
    /// unchanged and keeps resolving exactly as before.
    pub fn alter(&self, layer: Layer) -> Config {
        Config {
            head: Some(Arc::new(Link {
                layer: Arc::new(layer),
                next: self.head.clone(),
            })),
        }
    }

    /// Place this chain's layers, in order, in front of `other`'s chain.
    /// Costs one link per layer of the receiver; `other` is shared, not
    /// copied.
    pub fn or_else(&self, other: &Config) -> Config {
        let mut layers = Vec::new();
        let mut cur = self.head.clone();
        while let Some(link) = cur {
            layers.push(Arc::clone(&link.layer));
            cur = link.next.clone();
        }
        let mut head = other.head.clone();
        for layer in layers.into_iter().rev() {
            head = Some(Arc::new(Link { layer, next: head }));
        }
        Config { head }
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head.as_deref();
        while let Some(link) = cur {
            n += 1;
            cur = link.next.as_deref();
        }
        n
    }

    /// Resolve `key`, falling back to its declared default; a key absent
    /// everywhere with no default is [`ConfigError::KeyNotFound`].
    pub fn resolve<T: Clone + Send + Sync + 'static>(&self, key: &Key<T>) -> ConfigResult<T> {
        self.view().resolve(key)
    }

    /// Resolve `key`, yielding `None` when it is absent everywhere and
    /// declares no default.
    pub fn try_resolve<T: Clone + Send + Sync + 'static>(&self, key: &Key<T>) -> Option<T> {
        self.view().try_resolve(key)
    }

    fn view(&self) -> View {
        View {
            site: self.head.clone(),
            scope: Scope::From(self.head.clone()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").field("depth", &self.depth()).finish()
    }
}

enum Scope {
    /// Walk the chain starting at this link.
    From(Option<Arc<Link>>),
    /// Consult exactly this link's layer and nothing behind it.
    Only(Arc<Link>),
}

/// A restartable lookup position inside a chain, handed to computed layer
/// entries as the site/here/up arguments.
pub struct View {
    site: Option<Arc<Link>>,
    scope: Scope,
}

impl View {
    /// Resolve `key` from this view's restart point.
    pub fn resolve<T: Clone + Send + Sync + 'static>(&self, key: &Key<T>) -> ConfigResult<T> {
        match self.find(key)? {
            Some(value) => Ok(value),
            None => key.default().ok_or_else(|| ConfigError::KeyNotFound {
                key: key.name().to_string(),
                id: key.id(),
            }),
        }
    }

    /// Resolve `key`, yielding `None` for a defaultless absent key. Only
    /// genuine absence falls back to the default; a type-mismatched entry
    /// yields `None`, just as [`resolve`](View::resolve) errors on it.
    pub fn try_resolve<T: Clone + Send + Sync + 'static>(&self, key: &Key<T>) -> Option<T> {
        match self.find(key) {
            Ok(Some(value)) => Some(value),
            Ok(None) => key.default(),
            Err(_) => None,
        }
    }

    fn find<T: Clone + Send + Sync + 'static>(&self, key: &Key<T>) -> ConfigResult<Option<T>> {
        let erased = match &self.scope {
            Scope::From(start) => {
                let mut found = None;
                let mut cur = start.clone();
                while let Some(link) = cur {
                    if let Some(resolver) = link.layer.lookup(key.id()) {
                        let resolver = Arc::clone(resolver);
                        found = Some(self.invoke(&resolver, &link));
                        break;
                    }
                    cur = link.next.clone();
                }
                found
            }
            Scope::Only(link) => link
                .layer
                .lookup(key.id())
                .map(Arc::clone)
                .map(|resolver| self.invoke(&resolver, link)),
        };
        match erased {
            None => Ok(None),
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Ok(Some(*value)),
                Err(_) => Err(ConfigError::ValueType {
                    key: key.name().to_string(),
                    id: key.id(),
                }),
            },
        }
    }

    fn invoke(
        &self,
        resolver: &Arc<dyn Fn(&View, &View, &View) -> Box<dyn Any + Send + Sync> + Send + Sync>,
        link: &Arc<Link>,
    ) -> Box<dyn Any + Send + Sync> {
        let site = View {
            site: self.site.clone(),
            scope: Scope::From(self.site.clone()),
        };
        let here = View {
            site: self.site.clone(),
            scope: Scope::Only(Arc::clone(link)),
        };
        let up = View {
            site: self.site.clone(),
            scope: Scope::From(link.next.clone()),
        };
        resolver(&site, &here, &up)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use super::*;
    use crate::layer::Entry;

    // The typed builder cannot produce an entry whose stored value disagrees
    // with its key's type; forge one directly to cover the mismatch path.
    fn mistyped_layer(key: &Key<u32>) -> Layer {
        Layer {
            entries: vec![Entry {
                key: key.id(),
                resolver: Arc::new(|_, _, _| -> Box<dyn Any + Send + Sync> {
                    Box::new("not a number")
                }),
            }],
        }
    }

    #[test]
    fn mismatched_value_type_never_falls_back_to_the_default() {
        let key = Key::with_default("width", 4u32);
        let cfg = Config::new().alter(mistyped_layer(&key));
        assert!(matches!(
            cfg.resolve(&key),
            Err(ConfigError::ValueType { .. })
        ));
        assert_eq!(cfg.try_resolve(&key), None);
    }
}
