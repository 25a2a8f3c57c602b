// Read-only introspection tree.
//
// The view is the whole export surface of the core: a serializable
// description of the component tree, the nodes it owns, and the resolved
// edges with their render styling. Emitting an actual diagram format from it
// is an exporter's concern, not the engine's.

use serde::Serialize;

use crate::component::{ComponentId, Phase};
use crate::graph::Graph;
use crate::node::NodeRole;

/// Serializable description of a finished graph.
#[derive(Clone, Debug, Serialize)]
pub struct GraphView {
    pub components: Vec<ComponentView>,
    pub edges: Vec<EdgeView>,
}

/// One component and, nested, everything it declared.
#[derive(Clone, Debug, Serialize)]
pub struct ComponentView {
    pub name: String,
    pub phase: Phase,
    pub nodes: Vec<NodeView>,
    pub children: Vec<ComponentView>,
}

/// Summary of one node.
#[derive(Clone, Debug, Serialize)]
pub struct NodeView {
    pub name: String,
    pub role: NodeRole,
    pub inward_ports: usize,
    pub outward_ports: usize,
}

/// One resolved edge with its descriptive styling.
#[derive(Clone, Debug, Serialize)]
pub struct EdgeView {
    pub source: String,
    pub source_port: usize,
    pub sink: String,
    pub sink_port: usize,
    pub colour: String,
    pub label: String,
}

pub(crate) fn build_view(graph: &Graph) -> GraphView {
    GraphView {
        components: graph
            .roots()
            .into_iter()
            .map(|root| component_view(graph, root))
            .collect(),
        edges: graph
            .edges()
            .iter()
            .map(|edge| EdgeView {
                source: edge.source_name.clone(),
                source_port: edge.source_port,
                sink: edge.sink_name.clone(),
                sink_port: edge.sink_port,
                colour: edge.style.colour.clone(),
                label: edge.style.label.clone(),
            })
            .collect(),
    }
}

fn component_view(graph: &Graph, id: ComponentId) -> ComponentView {
    let component = graph.component(id);
    ComponentView {
        name: component.name().to_string(),
        phase: component.phase(),
        nodes: component
            .nodes()
            .iter()
            .map(|&node| {
                let node = graph.arena().get(node);
                let (inward, outward) = node.port_counts();
                NodeView {
                    name: node.name().to_string(),
                    role: node.role(),
                    inward_ports: inward,
                    outward_ports: outward,
                }
            })
            .collect(),
        children: component
            .children()
            .iter()
            .map(|&child| component_view(graph, child))
            .collect(),
    }
}
