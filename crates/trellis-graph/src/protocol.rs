// The connection-protocol plugin contract.
//
// A protocol supplies everything the engine does not want to know: what the
// parameters flowing down and up a pending connection look like, how a pair of
// them merges into an edge parameter, and how a resolved edge materializes
// into a channel value. The engine never inspects any of the five associated
// types.

use serde::Serialize;
use trellis_config::Config;

use crate::error::GraphError;
use crate::node::NodeRole;

/// Context handed to `edge_out`/`edge_in` while one connection is negotiated.
pub struct EdgeContext<'a> {
    /// The configuration chain the build was started with.
    pub config: &'a Config,
    /// Name of the node on the source (downward-supplying) side.
    pub source: &'a str,
    /// Name of the node on the sink (downward-receiving) side.
    pub sink: &'a str,
}

/// Read-only description of a node, handed to the mix hooks.
pub struct NodeInfo<'a> {
    pub name: &'a str,
    pub role: NodeRole,
    pub inward_ports: usize,
    pub outward_ports: usize,
}

/// Descriptive rendering of a resolved edge, consumed only by
/// introspection/export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EdgeStyle {
    pub colour: String,
    pub label: String,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        EdgeStyle {
            colour: "black".to_string(),
            label: String::new(),
        }
    }
}

/// A connection-protocol plugin.
///
/// `Down`/`Up` are the pre-negotiation parameters flowing source-to-sink and
/// sink-to-source; `EdgeOut`/`EdgeIn` the per-connection merged edge
/// parameters seen from each side (the same type, and usually the same
/// function body, for a symmetric protocol); `Channel` the materialized value
/// flowing between the two nodes once the edge is resolved.
pub trait Protocol: 'static {
    type Down: Clone + 'static;
    type Up: Clone + 'static;
    type EdgeOut: Clone + 'static;
    type EdgeIn: Clone + 'static;
    type Channel: 'static;

    /// Merge one downward and one upward parameter into the outward-side edge
    /// parameter. Errors are fatal for the build.
    fn edge_out(
        &self,
        down: &Self::Down,
        up: &Self::Up,
        cx: &EdgeContext<'_>,
    ) -> Result<Self::EdgeOut, GraphError>;

    /// Merge one downward and one upward parameter into the inward-side edge
    /// parameter.
    fn edge_in(
        &self,
        down: &Self::Down,
        up: &Self::Up,
        cx: &EdgeContext<'_>,
    ) -> Result<Self::EdgeIn, GraphError>;

    /// Materialize one channel value per outward edge, in port order.
    fn channel_out(&self, edges: &[Self::EdgeOut]) -> Vec<Self::Channel>;

    /// Materialize one channel value per inward edge, in port order.
    fn channel_in(&self, edges: &[Self::EdgeIn]) -> Vec<Self::Channel>;

    /// Node-local adjustment of a downward parameter before it propagates
    /// further. Identity by default.
    fn mix_outward(&self, down: Self::Down, _node: &NodeInfo<'_>) -> Self::Down {
        down
    }

    /// Node-local adjustment of an upward parameter. Identity by default.
    fn mix_inward(&self, up: Self::Up, _node: &NodeInfo<'_>) -> Self::Up {
        up
    }

    /// Observer hook invoked when a binding links two materialized channel
    /// values. Must not alter negotiated parameters; no-op by default.
    fn monitor(&self, _channel: &Self::Channel, _edge: &Self::EdgeIn) {}

    /// Purely descriptive rendering of a resolved edge for introspection.
    fn render(&self, _edge: &Self::EdgeIn) -> EdgeStyle {
        EdgeStyle::default()
    }
}
