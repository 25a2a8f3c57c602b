// Trellis graph-negotiation engine.
//
// Components declare typed nodes while they are on the construction stack,
// connect them pairwise (recording deferred binding tuples), and a single
// depth-first instantiation pass then negotiates every connection's
// parameters in both directions, resolves the edges, and materializes the
// channel values. All protocol-specific behaviour lives behind the
// `Protocol` trait; the engine never inspects the negotiated types.
//
// The whole pass is synchronous and single-threaded: declaration is ordinary
// nested calls, instantiation a depth-first tree walk. Any error aborts the
// build with no partial artifact.

mod arena;
mod arity;
mod builder;
mod component;
mod error;
mod graph;
mod node;
mod protocol;
mod view;

pub use arena::NodeId;
pub use arity::Arity;
pub use builder::{Builder, NodeHandle};
pub use component::{Component, ComponentId, Phase};
pub use error::{GraphError, GraphResult};
pub use graph::{ChannelLink, Graph, ResolvedEdge};
pub use node::{broadcast, DownFn, Node, NodeRole, NodeSpec, UpFn};
pub use protocol::{EdgeContext, EdgeStyle, NodeInfo, Protocol};
pub use view::{ComponentView, EdgeView, GraphView, NodeView};

// The anyhow error type is part of the plugin contract (protocol errors are
// surfaced as `GraphError::Protocol`); re-export it so plugins need not name
// the crate themselves.
pub use anyhow;
