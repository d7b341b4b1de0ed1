mod common;

use crate::common::{GraphBuilder, raw_edges};

use nodeforge::dag::{CycleChecker, Direction, GraphTraversal, Order, PinRef};
use nodeforge::errors::GraphError;

const DIAMOND: &[(usize, usize)] = &[(0, 1), (0, 2), (1, 3), (2, 3)];

const TWO_SOURCES: &[(usize, usize)] = &[
    (0, 2),
    (1, 3),
    (2, 4),
    (2, 5),
    (3, 4),
    (3, 5),
    (4, 6),
    (5, 6),
];

fn walk(
    n: usize,
    pairs: &[(usize, usize)],
    start: usize,
    direction: Direction,
    unique: bool,
    order: Order,
) -> Vec<usize> {
    GraphTraversal::new(n, &raw_edges(pairs), start, direction, unique, order).collect()
}

#[test]
fn test_diamond_downstream_unique_order() {
    let order = walk(4, DIAMOND, 0, Direction::Downstream, true, Order::PreOrder);
    assert_eq!(order, vec![0, 1, 3, 2]);
}

#[test]
fn test_diamond_upstream_unique_order() {
    let order = walk(4, DIAMOND, 3, Direction::Upstream, true, Order::PreOrder);
    assert_eq!(order, vec![3, 1, 0, 2]);
}

#[test]
fn test_upstream_equals_downstream_on_transposed_edges() {
    let transposed: Vec<(usize, usize)> = DIAMOND.iter().map(|&(a, b)| (b, a)).collect();
    let upstream = walk(4, DIAMOND, 3, Direction::Upstream, true, Order::PreOrder);
    let downstream = walk(4, &transposed, 3, Direction::Downstream, true, Order::PreOrder);
    assert_eq!(upstream, downstream);
}

#[test]
fn test_two_sources_downstream_from_first_source() {
    let order = walk(7, TWO_SOURCES, 0, Direction::Downstream, true, Order::PreOrder);
    assert_eq!(order, vec![0, 2, 4, 6, 5]);
}

#[test]
fn test_non_unique_traversal_revisits_shared_descendant() {
    let order = walk(4, DIAMOND, 0, Direction::Downstream, false, Order::PreOrder);
    assert_eq!(order, vec![0, 1, 3, 2, 3]);
}

#[test]
fn test_upstream_post_order_yields_dependencies_first() {
    let order = walk(4, DIAMOND, 3, Direction::Upstream, true, Order::PostOrder);
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_downstream_post_order_reversed_is_topological() {
    let mut order = walk(7, TWO_SOURCES, 1, Direction::Downstream, true, Order::PostOrder);
    order.reverse();

    let position = |n: usize| order.iter().position(|&x| x == n).unwrap();
    for &(from, to) in TWO_SOURCES {
        if order.contains(&from) && order.contains(&to) {
            assert!(
                position(from) < position(to),
                "{from} must precede {to} in {order:?}"
            );
        }
    }
    assert_eq!(order.len(), 5, "1 reaches 3, 4, 5 and 6");
}

#[test]
fn test_unique_traversal_visits_each_reachable_node_once() {
    let order = walk(7, TWO_SOURCES, 1, Direction::Downstream, true, Order::PreOrder);
    let mut sorted = order.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), order.len());
    assert_eq!(sorted, vec![1, 3, 4, 5, 6]);
}

#[test]
fn test_start_out_of_range_yields_nothing() {
    let order = walk(4, DIAMOND, 9, Direction::Downstream, true, Order::PreOrder);
    assert!(order.is_empty());
}

#[test]
fn test_back_edge_is_detected_by_cycle_checker() {
    let mut pairs = DIAMOND.to_vec();
    assert!(!CycleChecker::new(4, &raw_edges(&pairs), 0).has_cycles());

    pairs.push((3, 0));
    assert!(CycleChecker::new(4, &raw_edges(&pairs), 0).has_cycles());
}

#[test]
fn test_traversal_terminates_on_cyclic_edges_and_flags_cycle() {
    let pairs = [(0, 1), (1, 2), (2, 0)];
    let mut traversal = GraphTraversal::new(
        3,
        &raw_edges(&pairs),
        0,
        Direction::Downstream,
        false,
        Order::PreOrder,
    );
    let order: Vec<usize> = traversal.by_ref().collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert!(traversal.cycle_detected());
    assert!(traversal.ancestors().is_empty());
}

#[test]
fn test_graph_traversal_and_visitor_forms_agree() {
    let test = GraphBuilder::new().numbered(4).edges(DIAMOND).build();
    let graph = &test.graph;

    let iterated: Vec<usize> = graph.traverse_downstream(0, true).collect();
    let mut visited = Vec::new();
    graph.visit_downstream(0, true, |n| visited.push(n));
    assert_eq!(iterated, visited);
    assert_eq!(iterated, vec![0, 1, 3, 2]);

    let mut upstream = Vec::new();
    graph.visit_upstream(3, true, |n| upstream.push(n));
    assert_eq!(upstream, vec![3, 1, 0, 2]);
}

#[test]
fn test_adding_back_edge_to_graph_is_rejected() {
    let mut test = GraphBuilder::new().numbered(4).edges(DIAMOND).build();
    let before = test.graph.edges().to_vec();

    let err = test
        .graph
        .add_edge(PinRef::output(3, 0), PinRef::input(0, 0))
        .unwrap_err();

    assert!(matches!(err, GraphError::Cycle { .. }));
    assert_eq!(test.graph.edges(), before.as_slice());
    assert!(!test.graph.has_cycles(0));
}
