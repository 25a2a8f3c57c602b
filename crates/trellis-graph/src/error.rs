//-----------------------------------------------------------------------------
// Graph Error Types
//-----------------------------------------------------------------------------

use thiserror::Error;

use crate::arity::Arity;

/// Result alias for graph construction operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while declaring or instantiating a graph.
///
/// Every variant is fatal for the build pass that raised it: there is no
/// partial artifact. Each carries enough identity to pinpoint the declaration
/// site that caused it.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node was declared while no component was open
    #[error("node `{node}` declared outside an open component")]
    NodeOutsideComponent { node: String },

    /// A connection was recorded while no component was open
    #[error("connection from `{source_node}` to `{sink_node}` recorded outside an open component")]
    ConnectOutsideComponent {
        source_node: String,
        sink_node: String,
    },

    /// A connection endpoint's component is not reachable from the
    /// construction stack
    #[error("node `{node}` of component `{component}` is not reachable from the construction stack")]
    EndpointOutOfScope { node: String, component: String },

    /// Components were closed out of push/pop order
    #[error("component `{expected}` closed out of order; `{found}` is on top of the construction stack")]
    ScopeMismatch { expected: String, found: String },

    /// A component was closed a second time
    #[error("component `{component}` is already closed")]
    AlreadyClosed { component: String },

    /// The artifact was demanded while a component was still being declared
    #[error("instantiation requested while component `{component}` is still being declared")]
    UnterminatedDeclaration { component: String },

    /// A node declared an arity range admitting no count at all
    #[error("node `{node}` declares the vacant arity range {range}")]
    EmptyArity { node: String, range: Arity },

    /// Realized inward port count fell outside the declared range
    #[error("node `{node}` has {found} inward connections, outside the declared range {range}")]
    InwardArity { node: String, found: usize, range: Arity },

    /// Realized outward port count fell outside the declared range
    #[error("node `{node}` has {found} outward connections, outside the declared range {range}")]
    OutwardArity { node: String, found: usize, range: Arity },

    /// An adapter node joined unequal numbers of outward and inward ports
    #[error("adapter node `{node}` joins {outward} outward ports to {inward} inward ports; the counts must match")]
    UnbalancedAdapter { node: String, outward: usize, inward: usize },

    /// A node was connected after its ports were finalized
    #[error("node `{node}` was rebound after its ports were finalized")]
    PortsFrozen { node: String },

    /// An aggregation function produced the wrong number of values
    #[error("aggregation on node `{node}` produced {produced} values for {expected} ports")]
    AggregationArity {
        node: String,
        produced: usize,
        expected: usize,
    },

    /// Parameter negotiation revisited a node already being negotiated
    #[error("parameter negotiation cycle through node `{node}`")]
    NegotiationCycle { node: String },

    /// Two connected nodes negotiate different protocols
    #[error("nodes `{source_node}` and `{sink_node}` negotiate different protocols")]
    ProtocolMismatch {
        source_node: String,
        sink_node: String,
    },

    /// An invariant of the engine itself was violated; not caused by the
    /// caller's declarations
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),

    /// A protocol plugin rejected the negotiated parameters; opaque to the
    /// engine but fatal for the build
    #[error("protocol error: {0}")]
    Protocol(#[from] anyhow::Error),

    /// A configuration lookup failed during construction or negotiation
    #[error(transparent)]
    Config(#[from] trellis_config::ConfigError),
}
