// Trellis hierarchical configuration.
//
// A `Config` is a persistent chain of override layers consulted front-to-back
// when resolving a `Key`. Component constructors and protocol plugins receive
// a chain at construction time and look values up through it; the graph engine
// itself only ever composes layers handed to it by callers.

mod chain;
mod error;
mod key;
mod layer;

pub use chain::{Config, View};
pub use error::{ConfigError, ConfigResult};
pub use key::{Key, KeyId};
pub use layer::{Layer, LayerBuilder};
