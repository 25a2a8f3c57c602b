// The finished artifact of one build pass.
//
// A `Graph` is immutable: every edge, channel value, and component phase was
// fixed when `Builder::instantiate` returned it. All access is read-only.

use serde::Serialize;
use trellis_config::Config;

use crate::arena::{NodeArena, NodeId};
use crate::builder::NodeHandle;
use crate::component::{Component, ComponentId};
use crate::node::Node;
use crate::protocol::{EdgeStyle, Protocol};
use crate::view::GraphView;

/// One resolved node-to-node connection.
#[derive(Clone, Debug)]
pub struct ResolvedEdge {
    pub source: NodeId,
    pub source_name: String,
    pub source_port: usize,
    pub sink: NodeId,
    pub sink_name: String,
    pub sink_port: usize,
    pub style: EdgeStyle,
}

/// The channel-value pairing established by one replayed binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelLink {
    pub source: NodeId,
    pub source_port: usize,
    pub sink: NodeId,
    pub sink_port: usize,
}

/// The immutable, fully negotiated graph.
pub struct Graph {
    config: Config,
    arena: NodeArena,
    components: Vec<Component>,
    edges: Vec<ResolvedEdge>,
}

impl Graph {
    pub(crate) fn new(
        config: Config,
        arena: NodeArena,
        components: Vec<Component>,
        edges: Vec<ResolvedEdge>,
    ) -> Self {
        Graph {
            config,
            arena,
            components,
            edges,
        }
    }

    /// The configuration chain the build ran with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ids of the components with no parent, in declaration order.
    pub fn roots(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent().is_none())
            .map(|(i, _)| ComponentId(i))
            .collect()
    }

    /// Look up one component.
    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    /// Every component, in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Every resolved edge, in binding-replay order.
    pub fn edges(&self) -> &[ResolvedEdge] {
        &self.edges
    }

    /// The channel-value pairings, in binding-replay order.
    pub fn links(&self) -> Vec<ChannelLink> {
        self.edges
            .iter()
            .map(|edge| ChannelLink {
                source: edge.source,
                source_port: edge.source_port,
                sink: edge.sink,
                sink_port: edge.sink_port,
            })
            .collect()
    }

    /// Typed access to a node's resolved state. `None` when the handle was
    /// minted by a different build.
    pub fn node<P: Protocol>(&self, handle: &NodeHandle<P>) -> Option<&Node<P>> {
        self.arena.typed::<P>(handle.id())
    }

    /// Serializable read-only description of the whole graph, for export
    /// consumers.
    pub fn view(&self) -> GraphView {
        crate::view::build_view(self)
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }
}
