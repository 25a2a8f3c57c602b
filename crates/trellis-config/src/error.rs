//-----------------------------------------------------------------------------
// Configuration Error Types
//-----------------------------------------------------------------------------

use thiserror::Error;

use crate::key::KeyId;

/// Result alias for configuration lookups
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while resolving keys against a configuration chain
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No layer in the chain maps the key and the key declares no default
    #[error("no value for key `{key}` ({id}) and the key declares no default")]
    KeyNotFound { key: String, id: KeyId },

    /// A layer produced a value of the wrong type for the key.
    /// Unreachable through the typed `LayerBuilder` API; kept so the
    /// type-erased lookup path never panics.
    #[error("layer produced a value of the wrong type for key `{key}` ({id})")]
    ValueType { key: String, id: KeyId },
}
