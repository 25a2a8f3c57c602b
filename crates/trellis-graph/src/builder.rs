// The explicit build context.
//
// A `Builder` owns everything one declare/instantiate pass needs: the
// configuration chain, the node arena, the component table, and the
// construction stack. The stack governs the declaration invariants: nodes
// attach to the component on top, child components register with the
// component on top, and connections record their deferred binding on the
// component on top. The stack must be empty again before instantiation.

use std::marker::PhantomData;

use tracing::{debug, trace};
use trellis_config::Config;

use crate::arena::{NodeArena, NodeId};
use crate::component::{Binding, Component, ComponentId, Phase};
use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{Node, NodeSpec};
use crate::protocol::Protocol;

/// Typed handle to a declared node, valid for the builder (and the graph)
/// that minted it.
pub struct NodeHandle<P: Protocol> {
    id: NodeId,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Protocol> NodeHandle<P> {
    fn new(id: NodeId) -> Self {
        NodeHandle {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<P: Protocol> Clone for NodeHandle<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Protocol> Copy for NodeHandle<P> {}

/// Build context for one declare/instantiate pass.
pub struct Builder {
    config: Config,
    arena: NodeArena,
    components: Vec<Component>,
    stack: Vec<ComponentId>,
}

impl Builder {
    /// Start a build pass parameterized by `config`. The builder composes
    /// nothing into the chain itself; it only hands it on.
    pub fn new(config: Config) -> Self {
        Builder {
            config,
            arena: NodeArena::new(),
            components: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// The configuration chain this build was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    //-------------------------------------------------------------------------
    // Component lifecycle
    //-------------------------------------------------------------------------

    /// Open a component: its parent is the current top of the construction
    /// stack, it registers itself as that parent's child, and it becomes the
    /// new top.
    pub fn open_component(&mut self, name: impl Into<String>) -> ComponentId {
        let name = name.into();
        let id = ComponentId(self.components.len());
        let parent = self.stack.last().copied();
        if let Some(parent) = parent {
            self.components[parent.0].children.push(id);
        }
        debug!(component = %name, ?parent, "opening component");
        self.components.push(Component::new(name, parent));
        self.stack.push(id);
        id
    }

    /// Close a component. It must be the current top of the stack and must
    /// not have been closed before; each component is closed exactly once.
    pub fn close_component(&mut self, id: ComponentId) -> Result<(), GraphError> {
        if self.components[id.0].phase != Phase::Open {
            return Err(GraphError::AlreadyClosed {
                component: self.components[id.0].name.clone(),
            });
        }
        match self.stack.last().copied() {
            Some(top) if top == id => {
                self.stack.pop();
                self.components[id.0].phase = Phase::Closed;
                debug!(component = %self.components[id.0].name, "closed component");
                Ok(())
            }
            Some(top) => Err(GraphError::ScopeMismatch {
                expected: self.components[id.0].name.clone(),
                found: self.components[top.0].name.clone(),
            }),
            None => Err(GraphError::ScopeMismatch {
                expected: self.components[id.0].name.clone(),
                found: "(empty stack)".to_string(),
            }),
        }
    }

    /// Scoped declaration of a component: opens it, runs `body`, and closes
    /// it on every exit path. A body error wins over a close error, since it
    /// names the original failure.
    pub fn component<R>(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(&mut Builder) -> Result<R, GraphError>,
    ) -> Result<(ComponentId, R), GraphError> {
        let id = self.open_component(name);
        let result = body(self);
        let closed = self.close_component(id);
        let value = result?;
        closed?;
        Ok((id, value))
    }

    //-------------------------------------------------------------------------
    // Declaration
    //-------------------------------------------------------------------------

    /// Declare a node owned by the component currently on top of the stack.
    pub fn node<P: Protocol>(&mut self, spec: NodeSpec<P>) -> Result<NodeHandle<P>, GraphError> {
        let owner = *self
            .stack
            .last()
            .ok_or_else(|| GraphError::NodeOutsideComponent {
                node: spec.name().to_string(),
            })?;
        let id = self.arena.next_id();
        trace!(node = %spec.name(), %id, owner = %self.components[owner.0].name, "declaring node");
        let node = Node::from_spec(id, owner, spec)?;
        self.arena.push(Box::new(node));
        self.components[owner.0].nodes.push(id);
        Ok(NodeHandle::new(id))
    }

    /// Connect `source`'s outward side to `sink`'s inward side.
    ///
    /// The connection is recorded positionally on both nodes (the order of
    /// `connect` calls determines port indices and, downstream, channel-array
    /// order) and a deferred binding tuple is appended to the component on
    /// top of the stack, which may be a common ancestor of both endpoints.
    /// Negotiation itself is deferred to instantiation.
    pub fn connect<P: Protocol>(
        &mut self,
        source: &NodeHandle<P>,
        sink: &NodeHandle<P>,
    ) -> Result<(), GraphError> {
        let enclosing = *self
            .stack
            .last()
            .ok_or_else(|| GraphError::ConnectOutsideComponent {
                source_node: self.arena.get(source.id).name().to_string(),
                sink_node: self.arena.get(sink.id).name().to_string(),
            })?;
        self.check_in_scope(source.id)?;
        self.check_in_scope(sink.id)?;

        let src = self
            .arena
            .typed::<P>(source.id)
            .ok_or_else(|| GraphError::ProtocolMismatch {
                source_node: self.arena.get(source.id).name().to_string(),
                sink_node: self.arena.get(sink.id).name().to_string(),
            })?;
        let snk = self
            .arena
            .typed::<P>(sink.id)
            .ok_or_else(|| GraphError::ProtocolMismatch {
                source_node: self.arena.get(source.id).name().to_string(),
                sink_node: self.arena.get(sink.id).name().to_string(),
            })?;

        let source_port = src.outward_count();
        let sink_port = snk.inward_count();
        src.push_outward(sink.id, sink_port)?;
        snk.push_inward(source.id, source_port)?;
        trace!(
            source = %src.name(),
            source_port,
            sink = %snk.name(),
            sink_port,
            "recorded connection"
        );
        self.components[enclosing.0].bindings.push(Binding {
            source: source.id,
            source_port,
            sink: sink.id,
            sink_port,
        });
        Ok(())
    }

    /// A connection endpoint is in scope when its owning component, or one of
    /// that component's ancestors, is currently on the construction stack.
    fn check_in_scope(&self, node: NodeId) -> Result<(), GraphError> {
        let owner = self.arena.get(node).component();
        let mut cursor = Some(owner);
        while let Some(id) = cursor {
            if self.stack.contains(&id) {
                return Ok(());
            }
            cursor = self.components[id.0].parent;
        }
        Err(GraphError::EndpointOutOfScope {
            node: self.arena.get(node).name().to_string(),
            component: self.components[owner.0].name.clone(),
        })
    }

    //-------------------------------------------------------------------------
    // Instantiation
    //-------------------------------------------------------------------------

    /// Finalize the graph: arity-check every node, then walk the component
    /// tree depth-first, replaying each component's deferred bindings in
    /// recorded order after all of its children are fully instantiated.
    ///
    /// Any error aborts the whole build; no partial artifact escapes.
    pub fn instantiate(mut self) -> Result<Graph, GraphError> {
        if let Some(top) = self.stack.last() {
            return Err(GraphError::UnterminatedDeclaration {
                component: self.components[top.0].name.clone(),
            });
        }
        debug!(
            components = self.components.len(),
            nodes = self.arena.len(),
            "instantiating graph"
        );
        for node in self.arena.iter() {
            node.finalize_arity()?;
        }
        let roots: Vec<ComponentId> = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(i, _)| ComponentId(i))
            .collect();
        let mut edges = Vec::new();
        for root in roots {
            self.instantiate_component(root, &mut edges)?;
        }
        debug!(edges = edges.len(), "graph instantiated");
        Ok(Graph::new(self.config, self.arena, self.components, edges))
    }

    fn instantiate_component(
        &mut self,
        id: ComponentId,
        edges: &mut Vec<crate::graph::ResolvedEdge>,
    ) -> Result<(), GraphError> {
        let children = self.components[id.0].children.clone();
        for child in children {
            self.instantiate_component(child, edges)?;
        }
        let bindings = self.components[id.0].bindings.clone();
        for binding in bindings {
            let source = self.arena.get(binding.source);
            let edge = source.replay_binding(&self.arena, &self.config, &binding)?;
            trace!(
                source = %edge.source_name,
                sink = %edge.sink_name,
                "replayed binding"
            );
            edges.push(edge);
        }
        self.components[id.0].phase = Phase::Instantiated;
        debug!(component = %self.components[id.0].name, "instantiated component");
        Ok(())
    }
}
