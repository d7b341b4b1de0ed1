mod common;

use std::sync::Arc;

use crate::common::{EventLog, FakeSpec, GraphBuilder};

use nodeforge::dag::{DependencyGraph, NodeDescriptor, PinRef};
use nodeforge::errors::GraphError;
use nodeforge::types::{DataType, Generation, NodeCategory, PinKind};
use nodeforge_test_utils::fake_nodes::FakeNode;

fn descriptor(name: &str, spec: FakeSpec) -> NodeDescriptor {
    NodeDescriptor {
        name: name.to_string(),
        category: NodeCategory::Filter,
        pins: spec.pins(),
        implementation: Arc::new(FakeNode::new(name, spec, EventLog::new())),
    }
}

#[test]
fn test_add_node_assigns_unique_ids_and_stacks_on_top() {
    let mut graph = DependencyGraph::new();
    let a = graph.add_node(descriptor("a", FakeSpec::new()));
    let b = graph.add_node(descriptor("b", FakeSpec::new()));

    assert_eq!((a, b), (0, 1));
    assert_ne!(graph.nodes()[a].id(), graph.nodes()[b].id());
    assert!(graph.nodes()[b].z_order > graph.nodes()[a].z_order);
    assert_eq!(graph.index_of(graph.nodes()[b].id()), Some(b));
}

#[test]
fn test_edge_direction_is_normalised() {
    let mut test = GraphBuilder::new().node("a").node("b").build();
    test.graph
        .add_edge(PinRef::input(1, 2), PinRef::output(0, 0))
        .unwrap();

    let edge = test.graph.edges()[0];
    assert_eq!(edge.begin, PinRef::output(0, 0));
    assert_eq!(edge.end, PinRef::input(1, 2));
}

#[test]
fn test_incompatible_pin_kinds_are_rejected() {
    let mut test = GraphBuilder::new().node("a").node("b").build();

    let out_out = test
        .graph
        .add_edge(PinRef::output(0, 0), PinRef::output(1, 0))
        .unwrap_err();
    assert!(matches!(out_out, GraphError::IncompatiblePins { .. }));

    let to_param = test
        .graph
        .add_edge(
            PinRef::output(0, 0),
            PinRef::new(1, PinKind::ParameterInput, 0),
        )
        .unwrap_err();
    assert_eq!(
        to_param,
        GraphError::IncompatiblePins {
            from: PinKind::Output,
            to: PinKind::ParameterInput
        }
    );

    let in_in = test
        .graph
        .add_edge(PinRef::input(0, 0), PinRef::mask(1, 0))
        .unwrap_err();
    assert!(matches!(in_in, GraphError::IncompatiblePins { .. }));
    assert!(test.graph.edges().is_empty());
}

#[test]
fn test_incompatible_data_types_are_rejected() {
    let mut test = GraphBuilder::new()
        .node_with("color", FakeSpec::new().data_type(DataType::COLOR))
        .node_with("height", FakeSpec::new().data_type(DataType::HEIGHTMAP))
        .node_with(
            "any",
            FakeSpec::new().data_type(DataType::HEIGHTMAP.union(DataType::COLOR)),
        )
        .build();

    let err = test
        .graph
        .add_edge(PinRef::output(0, 0), PinRef::input(1, 0))
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::IncompatibleTypes {
            from: DataType::COLOR.0,
            to: DataType::HEIGHTMAP.0
        }
    );

    test.graph
        .add_edge(PinRef::output(0, 0), PinRef::input(2, 0))
        .unwrap();
    assert_eq!(test.graph.edges().len(), 1);
}

#[test]
fn test_out_of_range_node_and_pin() {
    let mut test = GraphBuilder::new()
        .node_with("a", FakeSpec::new().inputs(1))
        .node_with("b", FakeSpec::new().inputs(1))
        .build();

    let err = test
        .graph
        .add_edge(PinRef::output(0, 0), PinRef::input(7, 0))
        .unwrap_err();
    assert_eq!(err, GraphError::NodeOutOfRange { index: 7, len: 2 });

    let err = test
        .graph
        .add_edge(PinRef::output(0, 0), PinRef::input(1, 3))
        .unwrap_err();
    assert!(matches!(err, GraphError::PinOutOfRange { index: 3, .. }));

    let err = test.graph.remove_edge(0).unwrap_err();
    assert_eq!(err, GraphError::EdgeOutOfRange { index: 0, len: 0 });
}

#[test]
fn test_second_edge_into_same_pin_replaces_first() {
    let mut test = GraphBuilder::new().numbered(3).build();
    test.graph
        .add_edge(PinRef::output(0, 0), PinRef::input(2, 0))
        .unwrap();
    test.graph
        .add_edge(PinRef::output(1, 0), PinRef::input(2, 0))
        .unwrap();

    assert_eq!(test.graph.edges().len(), 1);
    assert_eq!(test.graph.edges()[0].begin.node, 1);
}

#[test]
fn test_rejected_replacement_restores_replaced_edge_exactly() {
    // 0 -> 1 -> 2, plus 3 -> 0 on input 0 of node 0 and 3 -> 1 on input 1.
    let mut test = GraphBuilder::new().numbered(4).build();
    let g = &mut test.graph;
    g.add_edge(PinRef::output(3, 0), PinRef::input(0, 0)).unwrap();
    g.add_edge(PinRef::output(0, 0), PinRef::input(1, 0)).unwrap();
    g.add_edge(PinRef::output(1, 0), PinRef::input(2, 0)).unwrap();
    g.add_edge(PinRef::output(3, 0), PinRef::input(1, 1)).unwrap();
    let before = g.edges().to_vec();

    // Replacing 3 -> 0 with 2 -> 0 would close 0 -> 1 -> 2 -> 0.
    let err = g
        .add_edge(PinRef::output(2, 0), PinRef::input(0, 0))
        .unwrap_err();

    assert_eq!(
        err,
        GraphError::Cycle {
            from: "2".to_string(),
            to: "0".to_string()
        }
    );
    assert_eq!(g.edges(), before.as_slice());
}

#[test]
fn test_remove_node_drops_touching_edges_and_shifts_indices() {
    let mut test = GraphBuilder::new()
        .numbered(4)
        .edges(&[(0, 1), (1, 2), (0, 3), (2, 3)])
        .build();

    let removed = test.graph.remove_node(1).unwrap();
    assert_eq!(removed.name, "1");

    let names: Vec<&str> = test.graph.nodes().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["0", "2", "3"]);

    let pairs: Vec<(usize, usize)> = test
        .graph
        .edges()
        .iter()
        .map(|e| (e.begin.node, e.end.node))
        .collect();
    // 0 -> 3 becomes 0 -> 2 and 2 -> 3 becomes 1 -> 2.
    assert_eq!(pairs, vec![(0, 2), (1, 2)]);
}

#[test]
fn test_remove_node_by_id() {
    let mut test = GraphBuilder::new().node("a").node("b").edge("a", "b").build();
    let id = test.id("a");

    test.graph.remove_node_by_id(id).unwrap();
    assert_eq!(test.graph.len(), 1);
    assert!(test.graph.edges().is_empty());

    let err = test.graph.remove_node_by_id(id).unwrap_err();
    assert!(matches!(err, GraphError::NodeNotFound(_)));
}

#[test]
fn test_adding_edge_invalidates_downstream_nodes() {
    let mut test = GraphBuilder::new()
        .numbered(4)
        .edges(&[(1, 2), (2, 3)])
        .build();
    for node in 0..4 {
        let n = test.graph.node_mut(node).unwrap();
        n.flags.set_built(Generation::Preview, true);
        n.flags.set_built(Generation::Full, true);
        n.set_progress(1.0);
    }

    test.graph
        .add_edge(PinRef::output(0, 0), PinRef::input(2, 1))
        .unwrap();

    let built: Vec<bool> = test
        .graph
        .nodes()
        .iter()
        .map(|n| n.is_built(Generation::Preview) || n.is_built(Generation::Full))
        .collect();
    assert_eq!(built, vec![true, true, false, false]);
    assert_eq!(test.graph.nodes()[3].progress(), 0.0);
    assert_eq!(test.graph.nodes()[1].progress(), 1.0);
}

#[test]
fn test_removing_edge_invalidates_destination() {
    let mut test = GraphBuilder::new().numbered(2).edges(&[(0, 1)]).build();
    test.graph
        .node_mut(1)
        .unwrap()
        .flags
        .set_built(Generation::Full, true);

    let edge = test.graph.remove_edge(0).unwrap();
    assert_eq!(edge.end.node, 1);
    assert!(!test.graph.nodes()[1].is_built(Generation::Full));
}

#[test]
fn test_collect_node_edges_reports_mandatory_pins() {
    let test = GraphBuilder::new()
        .node("src")
        .node_with("blend", FakeSpec::new().inputs(2).mandatory())
        .edge("src", "blend")
        .build();

    let edges = test.graph.collect_node_edges(test.index("blend")).unwrap();
    assert_eq!(edges.inputs.len(), 2);
    assert_eq!(edges.masks.len(), 1);
    assert!(edges.inputs[0].is_connected());
    assert!(!edges.inputs[1].is_connected());
    assert!(!edges.mandatory_satisfied());

    let missing: Vec<usize> = edges.missing_mandatory().map(|c| c.pin).collect();
    assert_eq!(missing, vec![1]);
}

#[test]
fn test_selection() {
    let mut test = GraphBuilder::new().numbered(3).build();
    test.graph.select(0);
    test.graph.select(2);
    assert_eq!(test.graph.selected_nodes(), vec![0, 2]);

    test.graph.deselect(0);
    assert_eq!(test.graph.selected_nodes(), vec![2]);

    test.graph.clear_selection();
    assert!(test.graph.selected_nodes().is_empty());
}

#[test]
#[should_panic(expected = "already selected")]
fn test_selecting_selected_node_panics() {
    let mut test = GraphBuilder::new().numbered(1).build();
    test.graph.select(0);
    test.graph.select(0);
}

#[test]
fn test_bring_to_front() {
    let mut test = GraphBuilder::new().numbered(3).build();
    assert_eq!(test.graph.draw_order(), vec![0, 1, 2]);

    test.graph.bring_to_front(0).unwrap();
    assert_eq!(test.graph.draw_order(), vec![1, 2, 0]);

    let top = test.graph.nodes()[0].z_order;
    test.graph.bring_to_front(0).unwrap();
    assert_eq!(test.graph.nodes()[0].z_order, top, "already alone on top");

    assert!(test.graph.bring_to_front(9).is_err());
}
