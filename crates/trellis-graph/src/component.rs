// Components: the nodes of the declaration tree.
//
// A component is created Open, accumulates children, nodes, and binding
// tuples while it is on the construction stack, and is Closed exactly once
// when it leaves the stack. Instantiation later flips it to Instantiated,
// children first.

use std::fmt;

use serde::Serialize;

use crate::arena::NodeId;

/// Identity of a component; an index into the build's component table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(pub(crate) usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Lifecycle phase of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Being declared; mutations to its lists are legal.
    Open,
    /// Declaration finished; frozen.
    Closed,
    /// Children instantiated and own bindings replayed.
    Instantiated,
}

/// One deferred connection, recorded positionally at connect time and
/// replayed during instantiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Binding {
    pub(crate) source: NodeId,
    pub(crate) source_port: usize,
    pub(crate) sink: NodeId,
    pub(crate) sink_port: usize,
}

/// A node of the declaration tree.
#[derive(Debug)]
pub struct Component {
    pub(crate) name: String,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) phase: Phase,
}

impl Component {
    pub(crate) fn new(name: String, parent: Option<ComponentId>) -> Self {
        Component {
            name,
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
            bindings: Vec::new(),
            phase: Phase::Open,
        }
    }

    /// Explicit name supplied when the component was opened.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component this one was declared inside, if any.
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Child components in declaration order.
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Nodes owned by this component, in declaration order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }
}
