// The generic, protocol-agnostic graph node.
//
// Ports accumulate during declaration and freeze at arity finalization.
// Negotiation is lazy and memoized: a node's outgoing downward parameters are
// pulled from its inward peers on first demand, adjusted by the protocol's
// mix hook, and cached; upward flow is the mirror image. Edge parameters are
// then computed pairwise per port, and channel values are materialized last
// from the full edge array of a side, in port order.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};

use trellis_config::Config;

use crate::arena::{ErasedNode, NodeArena, NodeId};
use crate::arity::Arity;
use crate::component::{Binding, ComponentId};
use crate::error::GraphError;
use crate::graph::ResolvedEdge;
use crate::protocol::{EdgeContext, NodeInfo, Protocol};

/// Connection shape of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Supplies downward parameters only; no inward capacity.
    Source,
    /// Receives downward parameters only; no outward capacity.
    Sink,
    /// Joins equal numbers of inward and outward ports.
    Adapter,
    /// Pass-through with unresolved capacity on both sides.
    Junction,
}

/// Aggregation over inward-collected downward values, producing one value per
/// outward port.
pub type DownFn<P> = Box<dyn Fn(usize, &[<P as Protocol>::Down]) -> Vec<<P as Protocol>::Down>>;
/// Aggregation over outward-collected upward values, producing one value per
/// inward port.
pub type UpFn<P> = Box<dyn Fn(usize, &[<P as Protocol>::Up]) -> Vec<<P as Protocol>::Up>>;

/// Broadcast aggregation: replicate the first input into every requested
/// slot. With no inputs it produces nothing, which the aggregation-arity
/// check then reports against the node.
pub fn broadcast<T: Clone>() -> impl Fn(usize, &[T]) -> Vec<T> {
    |n, inputs| match inputs.first() {
        Some(value) => vec![value.clone(); n],
        None => Vec::new(),
    }
}

/// One declared connection endpoint: the peer node and the index of the
/// matching port on the peer's opposite side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PortRecord {
    peer: NodeId,
    peer_index: usize,
}

/// Declaration-time description of a node, consumed by
/// [`Builder::node`](crate::Builder::node).
pub struct NodeSpec<P: Protocol> {
    name: String,
    role: NodeRole,
    inward_arity: Arity,
    outward_arity: Arity,
    protocol: P,
    down_fn: DownFn<P>,
    up_fn: UpFn<P>,
}

impl<P: Protocol> NodeSpec<P> {
    /// A pure source supplying exactly one downward parameter per declared
    /// value; its outward arity is fixed to the value count.
    pub fn source(name: impl Into<String>, protocol: P, values: Vec<P::Down>) -> Self {
        let count = values.len();
        NodeSpec {
            name: name.into(),
            role: NodeRole::Source,
            inward_arity: Arity::none(),
            outward_arity: Arity::exactly(count),
            protocol,
            down_fn: Box::new(move |_n, _inputs| values.clone()),
            up_fn: Box::new(|_n, _inputs| Vec::new()),
        }
    }

    /// A pure sink supplying exactly one upward parameter per declared value;
    /// its inward arity is fixed to the value count.
    pub fn sink(name: impl Into<String>, protocol: P, values: Vec<P::Up>) -> Self {
        let count = values.len();
        NodeSpec {
            name: name.into(),
            role: NodeRole::Sink,
            inward_arity: Arity::exactly(count),
            outward_arity: Arity::none(),
            protocol,
            down_fn: Box::new(|_n, _inputs| Vec::new()),
            up_fn: Box::new(move |_n, _inputs| values.clone()),
        }
    }

    /// A full adapter: at least one port on each side, and equal counts on
    /// both sides once finalized.
    pub fn adapter(
        name: impl Into<String>,
        protocol: P,
        down_fn: impl Fn(usize, &[P::Down]) -> Vec<P::Down> + 'static,
        up_fn: impl Fn(usize, &[P::Up]) -> Vec<P::Up> + 'static,
    ) -> Self {
        Self::adapter_with_arity(
            name,
            protocol,
            Arity::at_least(1),
            Arity::at_least(1),
            down_fn,
            up_fn,
        )
    }

    /// An adapter with explicit arity ranges.
    pub fn adapter_with_arity(
        name: impl Into<String>,
        protocol: P,
        inward: Arity,
        outward: Arity,
        down_fn: impl Fn(usize, &[P::Down]) -> Vec<P::Down> + 'static,
        up_fn: impl Fn(usize, &[P::Up]) -> Vec<P::Up> + 'static,
    ) -> Self {
        NodeSpec {
            name: name.into(),
            role: NodeRole::Adapter,
            inward_arity: inward,
            outward_arity: outward,
            protocol,
            down_fn: Box::new(down_fn),
            up_fn: Box::new(up_fn),
        }
    }

    /// A pass-through junction: any number of ports on either side, with the
    /// supplied aggregations bridging unequal counts (see [`broadcast`]).
    pub fn junction(
        name: impl Into<String>,
        protocol: P,
        down_fn: impl Fn(usize, &[P::Down]) -> Vec<P::Down> + 'static,
        up_fn: impl Fn(usize, &[P::Up]) -> Vec<P::Up> + 'static,
    ) -> Self {
        NodeSpec {
            name: name.into(),
            role: NodeRole::Junction,
            inward_arity: Arity::any(),
            outward_arity: Arity::any(),
            protocol,
            down_fn: Box::new(down_fn),
            up_fn: Box::new(up_fn),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EvalState {
    Idle,
    Evaluating,
    Done,
}

struct NegotiatedState<P: Protocol> {
    /// One downward value per outward port, after mixing.
    down_out: Vec<P::Down>,
    /// One upward value per inward port, after mixing.
    up_in: Vec<P::Up>,
    edges_out: Vec<Option<P::EdgeOut>>,
    edges_in: Vec<Option<P::EdgeIn>>,
    channels_out: Option<Vec<P::Channel>>,
    channels_in: Option<Vec<P::Channel>>,
}

impl<P: Protocol> Default for NegotiatedState<P> {
    fn default() -> Self {
        NegotiatedState {
            down_out: Vec::new(),
            up_in: Vec::new(),
            edges_out: Vec::new(),
            edges_in: Vec::new(),
            channels_out: None,
            channels_in: None,
        }
    }
}

/// A typed connection point owned by exactly one component.
pub struct Node<P: Protocol> {
    id: NodeId,
    name: String,
    component: ComponentId,
    role: NodeRole,
    inward_arity: Arity,
    outward_arity: Arity,
    protocol: P,
    down_fn: DownFn<P>,
    up_fn: UpFn<P>,
    inward: RefCell<Vec<PortRecord>>,
    outward: RefCell<Vec<PortRecord>>,
    frozen: Cell<bool>,
    down_state: Cell<EvalState>,
    up_state: Cell<EvalState>,
    negotiated: RefCell<NegotiatedState<P>>,
}

impl<P: Protocol> Node<P> {
    pub(crate) fn from_spec(
        id: NodeId,
        component: ComponentId,
        spec: NodeSpec<P>,
    ) -> Result<Self, GraphError> {
        for range in [spec.inward_arity, spec.outward_arity] {
            if range.is_vacant() {
                return Err(GraphError::EmptyArity {
                    node: spec.name.clone(),
                    range,
                });
            }
        }
        Ok(Node {
            id,
            name: spec.name,
            component,
            role: spec.role,
            inward_arity: spec.inward_arity,
            outward_arity: spec.outward_arity,
            protocol: spec.protocol,
            down_fn: spec.down_fn,
            up_fn: spec.up_fn,
            inward: RefCell::new(Vec::new()),
            outward: RefCell::new(Vec::new()),
            frozen: Cell::new(false),
            down_state: Cell::new(EvalState::Idle),
            up_state: Cell::new(EvalState::Idle),
            negotiated: RefCell::new(NegotiatedState::default()),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn inward_arity(&self) -> Arity {
        self.inward_arity
    }

    pub fn outward_arity(&self) -> Arity {
        self.outward_arity
    }

    /// Number of inward connections declared so far.
    pub fn inward_count(&self) -> usize {
        self.inward.borrow().len()
    }

    /// Number of outward connections declared so far.
    pub fn outward_count(&self) -> usize {
        self.outward.borrow().len()
    }

    fn info(&self) -> NodeInfo<'_> {
        NodeInfo {
            name: &self.name,
            role: self.role,
            inward_ports: self.inward_count(),
            outward_ports: self.outward_count(),
        }
    }

    //-------------------------------------------------------------------------
    // Declaration
    //-------------------------------------------------------------------------

    /// Append an outward port; returns its index. Ports are append-only and
    /// rejected once frozen.
    pub(crate) fn push_outward(&self, peer: NodeId, peer_index: usize) -> Result<usize, GraphError> {
        if self.frozen.get() {
            return Err(GraphError::PortsFrozen {
                node: self.name.clone(),
            });
        }
        let mut ports = self.outward.borrow_mut();
        ports.push(PortRecord { peer, peer_index });
        Ok(ports.len() - 1)
    }

    pub(crate) fn push_inward(&self, peer: NodeId, peer_index: usize) -> Result<usize, GraphError> {
        if self.frozen.get() {
            return Err(GraphError::PortsFrozen {
                node: self.name.clone(),
            });
        }
        let mut ports = self.inward.borrow_mut();
        ports.push(PortRecord { peer, peer_index });
        Ok(ports.len() - 1)
    }

    //-------------------------------------------------------------------------
    // Negotiation
    //-------------------------------------------------------------------------

    /// Compute and cache this node's outgoing downward parameters: collect
    /// the value arriving on each inward port, aggregate, then mix.
    fn ensure_down(&self, arena: &NodeArena) -> Result<(), GraphError> {
        match self.down_state.get() {
            EvalState::Done => return Ok(()),
            EvalState::Evaluating => {
                return Err(GraphError::NegotiationCycle {
                    node: self.name.clone(),
                })
            }
            EvalState::Idle => {}
        }
        self.down_state.set(EvalState::Evaluating);
        match self.compute_down(arena) {
            Ok(values) => {
                self.negotiated.borrow_mut().down_out = values;
                self.down_state.set(EvalState::Done);
                Ok(())
            }
            Err(err) => {
                self.down_state.set(EvalState::Idle);
                Err(err)
            }
        }
    }

    fn compute_down(&self, arena: &NodeArena) -> Result<Vec<P::Down>, GraphError> {
        self.finalize_arity()?;
        let inward = self.inward.borrow().clone();
        let mut inputs = Vec::with_capacity(inward.len());
        for port in &inward {
            let peer = self.typed_peer(arena, port.peer)?;
            peer.ensure_down(arena)?;
            inputs.push(peer.negotiated.borrow().down_out[port.peer_index].clone());
        }
        let wanted = self.outward_count();
        let produced = (self.down_fn)(wanted, &inputs);
        if produced.len() != wanted {
            return Err(GraphError::AggregationArity {
                node: self.name.clone(),
                produced: produced.len(),
                expected: wanted,
            });
        }
        let info = self.info();
        Ok(produced
            .into_iter()
            .map(|value| self.protocol.mix_outward(value, &info))
            .collect())
    }

    /// Mirror image of [`ensure_down`] for upward flow.
    fn ensure_up(&self, arena: &NodeArena) -> Result<(), GraphError> {
        match self.up_state.get() {
            EvalState::Done => return Ok(()),
            EvalState::Evaluating => {
                return Err(GraphError::NegotiationCycle {
                    node: self.name.clone(),
                })
            }
            EvalState::Idle => {}
        }
        self.up_state.set(EvalState::Evaluating);
        match self.compute_up(arena) {
            Ok(values) => {
                self.negotiated.borrow_mut().up_in = values;
                self.up_state.set(EvalState::Done);
                Ok(())
            }
            Err(err) => {
                self.up_state.set(EvalState::Idle);
                Err(err)
            }
        }
    }

    fn compute_up(&self, arena: &NodeArena) -> Result<Vec<P::Up>, GraphError> {
        self.finalize_arity()?;
        let outward = self.outward.borrow().clone();
        let mut inputs = Vec::with_capacity(outward.len());
        for port in &outward {
            let peer = self.typed_peer(arena, port.peer)?;
            peer.ensure_up(arena)?;
            inputs.push(peer.negotiated.borrow().up_in[port.peer_index].clone());
        }
        let wanted = self.inward_count();
        let produced = (self.up_fn)(wanted, &inputs);
        if produced.len() != wanted {
            return Err(GraphError::AggregationArity {
                node: self.name.clone(),
                produced: produced.len(),
                expected: wanted,
            });
        }
        let info = self.info();
        Ok(produced
            .into_iter()
            .map(|value| self.protocol.mix_inward(value, &info))
            .collect())
    }

    /// Compute every outward edge parameter: pairwise, one per port,
    /// independent of one another.
    fn ensure_edges_out(&self, arena: &NodeArena, config: &Config) -> Result<(), GraphError> {
        self.ensure_down(arena)?;
        let outward = self.outward.borrow().clone();
        self.negotiated
            .borrow_mut()
            .edges_out
            .resize_with(outward.len(), || None);
        for (index, port) in outward.iter().enumerate() {
            if self.negotiated.borrow().edges_out[index].is_some() {
                continue;
            }
            let sink = self.typed_peer(arena, port.peer)?;
            sink.ensure_up(arena)?;
            let down = self.negotiated.borrow().down_out[index].clone();
            let up = sink.negotiated.borrow().up_in[port.peer_index].clone();
            let cx = EdgeContext {
                config,
                source: &self.name,
                sink: &sink.name,
            };
            let edge = self.protocol.edge_out(&down, &up, &cx)?;
            self.negotiated.borrow_mut().edges_out[index] = Some(edge);
        }
        Ok(())
    }

    fn ensure_edges_in(&self, arena: &NodeArena, config: &Config) -> Result<(), GraphError> {
        self.ensure_up(arena)?;
        let inward = self.inward.borrow().clone();
        self.negotiated
            .borrow_mut()
            .edges_in
            .resize_with(inward.len(), || None);
        for (index, port) in inward.iter().enumerate() {
            if self.negotiated.borrow().edges_in[index].is_some() {
                continue;
            }
            let source = self.typed_peer(arena, port.peer)?;
            source.ensure_down(arena)?;
            let down = source.negotiated.borrow().down_out[port.peer_index].clone();
            let up = self.negotiated.borrow().up_in[index].clone();
            let cx = EdgeContext {
                config,
                source: &source.name,
                sink: &self.name,
            };
            let edge = self.protocol.edge_in(&down, &up, &cx)?;
            self.negotiated.borrow_mut().edges_in[index] = Some(edge);
        }
        Ok(())
    }

    /// Materialize the outward channel values from the full edge array, in
    /// port order. Runs once.
    fn ensure_channels_out(&self, arena: &NodeArena, config: &Config) -> Result<(), GraphError> {
        if self.negotiated.borrow().channels_out.is_some() {
            return Ok(());
        }
        self.ensure_edges_out(arena, config)?;
        let edges: Vec<P::EdgeOut> = {
            let state = self.negotiated.borrow();
            state.edges_out.iter().filter_map(|e| e.clone()).collect()
        };
        let channels = self.protocol.channel_out(&edges);
        self.negotiated.borrow_mut().channels_out = Some(channels);
        Ok(())
    }

    fn ensure_channels_in(&self, arena: &NodeArena, config: &Config) -> Result<(), GraphError> {
        if self.negotiated.borrow().channels_in.is_some() {
            return Ok(());
        }
        self.ensure_edges_in(arena, config)?;
        let edges: Vec<P::EdgeIn> = {
            let state = self.negotiated.borrow();
            state.edges_in.iter().filter_map(|e| e.clone()).collect()
        };
        let channels = self.protocol.channel_in(&edges);
        self.negotiated.borrow_mut().channels_in = Some(channels);
        Ok(())
    }

    fn typed_peer<'a>(
        &self,
        arena: &'a NodeArena,
        peer: NodeId,
    ) -> Result<&'a Node<P>, GraphError> {
        arena
            .typed::<P>(peer)
            .ok_or_else(|| GraphError::ProtocolMismatch {
                source_node: self.name.clone(),
                sink_node: arena.get(peer).name().to_string(),
            })
    }

    //-------------------------------------------------------------------------
    // Resolved-state access
    //-------------------------------------------------------------------------

    /// Negotiated downward parameters, one per outward port.
    pub fn down_params(&self) -> Vec<P::Down> {
        self.negotiated.borrow().down_out.clone()
    }

    /// Negotiated upward parameters, one per inward port.
    pub fn up_params(&self) -> Vec<P::Up> {
        self.negotiated.borrow().up_in.clone()
    }

    /// Resolved outward edge parameters, in port order.
    pub fn edges_out(&self) -> Vec<P::EdgeOut> {
        self.negotiated
            .borrow()
            .edges_out
            .iter()
            .filter_map(|e| e.clone())
            .collect()
    }

    /// Resolved inward edge parameters, in port order.
    pub fn edges_in(&self) -> Vec<P::EdgeIn> {
        self.negotiated
            .borrow()
            .edges_in
            .iter()
            .filter_map(|e| e.clone())
            .collect()
    }

    /// Materialized outward channel values, in port order. Empty before
    /// instantiation.
    pub fn channels_out(&self) -> Ref<'_, [P::Channel]> {
        Ref::map(self.negotiated.borrow(), |state| {
            state.channels_out.as_deref().unwrap_or(&[])
        })
    }

    /// Materialized inward channel values, in port order. Empty before
    /// instantiation.
    pub fn channels_in(&self) -> Ref<'_, [P::Channel]> {
        Ref::map(self.negotiated.borrow(), |state| {
            state.channels_in.as_deref().unwrap_or(&[])
        })
    }
}

impl<P: Protocol> ErasedNode for Node<P> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn component(&self) -> ComponentId {
        self.component
    }

    fn role(&self) -> NodeRole {
        self.role
    }

    fn port_counts(&self) -> (usize, usize) {
        (self.inward_count(), self.outward_count())
    }

    fn finalize_arity(&self) -> Result<(), GraphError> {
        if self.frozen.get() {
            return Ok(());
        }
        let inward = self.inward_count();
        let outward = self.outward_count();
        if !self.inward_arity.admits(inward) {
            return Err(GraphError::InwardArity {
                node: self.name.clone(),
                found: inward,
                range: self.inward_arity,
            });
        }
        if !self.outward_arity.admits(outward) {
            return Err(GraphError::OutwardArity {
                node: self.name.clone(),
                found: outward,
                range: self.outward_arity,
            });
        }
        if self.role == NodeRole::Adapter && inward != outward {
            return Err(GraphError::UnbalancedAdapter {
                node: self.name.clone(),
                outward,
                inward,
            });
        }
        self.frozen.set(true);
        Ok(())
    }

    fn replay_binding(
        &self,
        arena: &NodeArena,
        config: &Config,
        binding: &Binding,
    ) -> Result<ResolvedEdge, GraphError> {
        let sink = self.typed_peer(arena, binding.sink)?;
        self.ensure_channels_out(arena, config)?;
        sink.ensure_channels_in(arena, config)?;

        // ensure_channels_in has just computed every inward edge of the sink.
        let edge_in = sink.negotiated.borrow().edges_in[binding.sink_port]
            .clone()
            .ok_or(GraphError::Internal(
                "inward edge missing after channel materialization",
            ))?;
        let style = sink.protocol.render(&edge_in);
        {
            let state = sink.negotiated.borrow();
            if let Some(channels) = state.channels_in.as_deref() {
                if let Some(channel) = channels.get(binding.sink_port) {
                    sink.protocol.monitor(channel, &edge_in);
                }
            }
        }
        Ok(ResolvedEdge {
            source: binding.source,
            source_name: self.name.clone(),
            source_port: binding.source_port,
            sink: binding.sink,
            sink_name: sink.name.clone(),
            sink_port: binding.sink_port,
            style,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arity::Arity;
    use crate::component::ComponentId;
    use crate::error::GraphError;
    use crate::protocol::{EdgeContext, Protocol};

    struct Unit;

    impl Protocol for Unit {
        type Down = ();
        type Up = ();
        type EdgeOut = ();
        type EdgeIn = ();
        type Channel = ();

        fn edge_out(&self, _: &(), _: &(), _: &EdgeContext<'_>) -> Result<(), GraphError> {
            Ok(())
        }
        fn edge_in(&self, _: &(), _: &(), _: &EdgeContext<'_>) -> Result<(), GraphError> {
            Ok(())
        }
        fn channel_out(&self, edges: &[()]) -> Vec<()> {
            edges.to_vec()
        }
        fn channel_in(&self, edges: &[()]) -> Vec<()> {
            edges.to_vec()
        }
    }

    fn raw_node(spec: NodeSpec<Unit>) -> Node<Unit> {
        Node::from_spec(NodeId(0), ComponentId(0), spec).unwrap()
    }

    #[test]
    fn vacant_arity_is_rejected_at_declaration() {
        let spec = NodeSpec::adapter_with_arity(
            "bad",
            Unit,
            Arity::between(3, 1),
            Arity::exactly(1),
            |_, _| Vec::new(),
            |_, _| Vec::new(),
        );
        match Node::from_spec(NodeId(0), ComponentId(0), spec) {
            Err(GraphError::EmptyArity { node, .. }) => assert_eq!(node, "bad"),
            other => panic!("expected EmptyArity, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn ports_are_append_only_after_freeze() {
        let node = raw_node(NodeSpec::junction(
            "pass",
            Unit,
            broadcast(),
            broadcast(),
        ));
        node.push_outward(NodeId(1), 0).unwrap();
        node.finalize_arity().unwrap();
        match node.push_outward(NodeId(2), 0) {
            Err(GraphError::PortsFrozen { node }) => assert_eq!(node, "pass"),
            other => panic!("expected PortsFrozen, got {other:?}"),
        }
    }

    #[test]
    fn finalize_names_the_node_and_counts() {
        let node = raw_node(NodeSpec::source("src", Unit, vec![(), ()]));
        // Only one of the two declared outward values is connected.
        node.push_outward(NodeId(1), 0).unwrap();
        match node.finalize_arity() {
            Err(GraphError::OutwardArity { node, found, range }) => {
                assert_eq!(node, "src");
                assert_eq!(found, 1);
                assert_eq!(range, Arity::exactly(2));
            }
            other => panic!("expected OutwardArity, got {other:?}"),
        }
    }

    #[test]
    fn adapter_requires_balanced_sides() {
        let node = raw_node(NodeSpec::adapter(
            "conv",
            Unit,
            |n, inputs| inputs.iter().cloned().take(n).collect(),
            |n, inputs| inputs.iter().cloned().take(n).collect(),
        ));
        node.push_inward(NodeId(1), 0).unwrap();
        node.push_outward(NodeId(2), 0).unwrap();
        node.push_outward(NodeId(3), 0).unwrap();
        match node.finalize_arity() {
            Err(GraphError::UnbalancedAdapter {
                node,
                outward,
                inward,
            }) => {
                assert_eq!(node, "conv");
                assert_eq!(outward, 2);
                assert_eq!(inward, 1);
            }
            other => panic!("expected UnbalancedAdapter, got {other:?}"),
        }
    }
}
