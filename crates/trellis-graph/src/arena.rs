// Id-indexed node storage.
//
// Nodes are stored type-erased behind `Box<dyn ErasedNode>` and recovered
// through their protocol type at the call sites that know it, the same
// `Any`-downcast arrangement the typed handles are built on. A `NodeId` is an
// index into this arena and is only ever minted by it.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use trellis_config::Config;

use crate::component::{Binding, ComponentId};
use crate::error::GraphError;
use crate::graph::ResolvedEdge;
use crate::node::{Node, NodeRole};
use crate::protocol::Protocol;

/// Identity of a node; an index into the build's node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The protocol-agnostic face of a stored node.
pub(crate) trait ErasedNode: Any {
    fn id(&self) -> NodeId;
    fn name(&self) -> &str;
    fn component(&self) -> ComponentId;
    fn role(&self) -> NodeRole;
    /// (inward, outward) port counts as currently declared.
    fn port_counts(&self) -> (usize, usize);
    /// Freeze the port lists and check them against the declared arities.
    fn finalize_arity(&self) -> Result<(), GraphError>;
    /// Negotiate and link one recorded binding whose source is this node.
    fn replay_binding(
        &self,
        arena: &NodeArena,
        config: &Config,
        binding: &Binding,
    ) -> Result<ResolvedEdge, GraphError>;
    fn as_any(&self) -> &dyn Any;
}

/// Arena owning every node declared during one build pass.
#[derive(Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Box<dyn ErasedNode>>,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    pub(crate) fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len())
    }

    pub(crate) fn push(&mut self, node: Box<dyn ErasedNode>) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> &dyn ErasedNode {
        &*self.nodes[id.0]
    }

    /// Recover a node through its protocol type; `None` when the stored node
    /// negotiates a different protocol.
    pub(crate) fn typed<P: Protocol>(&self, id: NodeId) -> Option<&Node<P>> {
        self.nodes.get(id.0)?.as_any().downcast_ref::<Node<P>>()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn ErasedNode> {
        self.nodes.iter().map(|n| &**n)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
