// Component lifecycle tests: the construction stack, scoped open/close, and
// the ordering errors the builder must surface.

use trellis_config::Config;
use trellis_graph::{
    Builder, EdgeContext, GraphError, NodeSpec, Phase, Protocol,
};

/// The smallest possible protocol: unit parameters everywhere.
#[derive(Clone, Copy)]
struct Ping;

impl Protocol for Ping {
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

#[test]
fn closing_twice_is_an_error() {
    let mut b = Builder::new(Config::new());
    let id = b.open_component("root");
    b.close_component(id).unwrap();
    match b.close_component(id) {
        Err(GraphError::AlreadyClosed { component }) => assert_eq!(component, "root"),
        other => panic!("expected AlreadyClosed, got {other:?}"),
    }
}

#[test]
fn instantiating_before_closing_is_an_error() {
    let mut b = Builder::new(Config::new());
    b.open_component("dangling");
    match b.instantiate() {
        Err(GraphError::UnterminatedDeclaration { component }) => {
            assert_eq!(component, "dangling")
        }
        Ok(_) => panic!("expected UnterminatedDeclaration, got a graph"),
        Err(other) => panic!("expected UnterminatedDeclaration, got {other:?}"),
    }
}

#[test]
fn closing_out_of_order_names_both_components() {
    let mut b = Builder::new(Config::new());
    let outer = b.open_component("outer");
    b.open_component("inner");
    match b.close_component(outer) {
        Err(GraphError::ScopeMismatch { expected, found }) => {
            assert_eq!(expected, "outer");
            assert_eq!(found, "inner");
        }
        other => panic!("expected ScopeMismatch, got {other:?}"),
    }
}

#[test]
fn node_outside_component_is_an_error() {
    let mut b = Builder::new(Config::new());
    match b.node(NodeSpec::source("stray", Ping, vec![()])) {
        Err(GraphError::NodeOutsideComponent { node }) => assert_eq!(node, "stray"),
        other => panic!("expected NodeOutsideComponent, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn connect_outside_component_is_an_error() {
    let mut b = Builder::new(Config::new());
    let (_id, (src, snk)) = b
        .component("root", |b| {
            let src = b.node(NodeSpec::source("src", Ping, vec![()]))?;
            let snk = b.node(NodeSpec::sink("snk", Ping, vec![()]))?;
            Ok((src, snk))
        })
        .unwrap();
    // The root is closed; the stack is empty again.
    match b.connect(&src, &snk) {
        Err(GraphError::ConnectOutsideComponent {
            source_node,
            sink_node,
        }) => {
            assert_eq!(source_node, "src");
            assert_eq!(sink_node, "snk");
        }
        other => panic!("expected ConnectOutsideComponent, got {other:?}"),
    }
}

#[test]
fn endpoint_in_a_foreign_tree_is_out_of_scope() {
    let mut b = Builder::new(Config::new());
    let (_a, orphan) = b
        .component("tree-a", |b| b.node(NodeSpec::source("a.out", Ping, vec![()])))
        .unwrap();

    let err = b
        .component("tree-b", |b| {
            let local = b.node(NodeSpec::sink("b.in", Ping, vec![()]))?;
            b.connect(&orphan, &local)
        })
        .unwrap_err();
    match err {
        GraphError::EndpointOutOfScope { node, component } => {
            assert_eq!(node, "a.out");
            assert_eq!(component, "tree-a");
        }
        other => panic!("expected EndpointOutOfScope, got {other:?}"),
    }
}

#[test]
fn scoped_component_closes_on_body_error() {
    let mut b = Builder::new(Config::new());
    let err = b
        .component("root", |b| {
            b.component("failing", |_| {
                Err::<(), _>(GraphError::Protocol(anyhow::anyhow!("boom")))
            })
            .map(|_| ())
        })
        .unwrap_err();
    assert!(matches!(err, GraphError::Protocol(_)));
    // Both components were popped on the error path; an empty-stack build
    // still instantiates.
    let graph = b.instantiate().unwrap();
    assert_eq!(graph.components().count(), 2);
}

#[test]
fn children_register_with_their_parent_in_order() {
    let mut b = Builder::new(Config::new());
    let (root, (first, second)) = b
        .component("root", |b| {
            let (first, _) = b.component("first", |_| Ok(()))?;
            let (second, _) = b.component("second", |_| Ok(()))?;
            Ok((first, second))
        })
        .unwrap();
    let graph = b.instantiate().unwrap();

    assert_eq!(graph.component(root).children().to_vec(), vec![first, second]);
    assert_eq!(graph.component(first).parent(), Some(root));
    assert_eq!(graph.component(first).name(), "first");
    assert_eq!(graph.component(second).name(), "second");
}

#[test]
fn instantiation_marks_every_component_instantiated() {
    let mut b = Builder::new(Config::new());
    let (root, child) = b
        .component("root", |b| {
            let (child, _) = b.component("child", |_| Ok(()))?;
            Ok(child)
        })
        .unwrap();
    let graph = b.instantiate().unwrap();
    assert_eq!(graph.component(root).phase(), Phase::Instantiated);
    assert_eq!(graph.component(child).phase(), Phase::Instantiated);
}
