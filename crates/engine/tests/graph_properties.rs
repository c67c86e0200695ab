//! Property tests for `TypeGraph` ordering and cycle reporting.

use proptest::prelude::*;
use wirebind_engine::TypeGraph;

/// A node count, a relabeling permutation and forward edges over the unpermuted labels.
fn arb_dag() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (1usize..24).prop_flat_map(|count| {
        let labels = Just((0..count).collect::<Vec<_>>()).prop_shuffle();
        let edges = prop::collection::vec((0..count, 0..count), 0..count * 3).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect::<Vec<_>>()
        });
        (labels, edges)
    })
}

fn build(labels: &[usize], edges: &[(usize, usize)]) -> (TypeGraph<usize>, Vec<(usize, usize)>) {
    let mut graph = TypeGraph::new();
    for label in 0..labels.len() {
        graph.add_node(label);
    }
    let relabeled: Vec<_> = edges.iter().map(|(from, to)| (labels[*from], labels[*to])).collect();
    for (from, to) in &relabeled {
        graph.add_edge(*from, &[*to]).unwrap();
    }
    (graph, relabeled)
}

fn has_edge(graph: &TypeGraph<usize>, from: usize, to: usize) -> bool {
    graph.successors(from).unwrap().any(|successor| successor == to)
}

proptest! {
    /// Every edge's source precedes its target and every node appears exactly once.
    #[test]
    fn sort_respects_every_edge((labels, edges) in arb_dag()) {
        let (graph, edges) = build(&labels, &edges);
        let order = graph.topological_sort().unwrap();

        let mut seen = order.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..labels.len()).collect::<Vec<_>>());

        let position = |node: usize| order.iter().position(|candidate| *candidate == node).unwrap();
        for (from, to) in edges {
            prop_assert!(position(from) < position(to), "{from} must precede {to} in {order:?}");
        }
    }

    /// Sorting the same graph twice gives the same order.
    #[test]
    fn sort_is_deterministic((labels, edges) in arb_dag()) {
        let (graph, _) = build(&labels, &edges);
        prop_assert_eq!(graph.topological_sort().unwrap(), graph.topological_sort().unwrap());
    }

    /// Closing a chain into a loop is always reported, and the reported path is a real cycle.
    #[test]
    fn closed_chains_report_a_walkable_cycle((labels, edges) in arb_dag(), length in 2usize..6) {
        let (mut graph, _) = build(&labels, &edges);
        let start = graph.len();
        for offset in 0..length {
            graph.add_node(start + offset);
        }
        for offset in 0..length - 1 {
            graph.add_edge(start + offset, &[start + offset + 1]).unwrap();
        }
        graph.add_edge(start + length - 1, &[start]).unwrap();

        let cycle = graph.topological_sort().unwrap_err();
        prop_assert_eq!(cycle.path.first().copied(), Some(cycle.origin));
        prop_assert_eq!(cycle.path.len(), length);
        for pair in cycle.path.windows(2) {
            prop_assert!(has_edge(&graph, pair[0], pair[1]));
        }
        let last = *cycle.path.last().unwrap();
        prop_assert!(has_edge(&graph, last, cycle.origin));
    }
}

#[test]
fn cycle_is_reported_from_the_node_that_closes_it() {
    let mut graph = TypeGraph::new();
    let a = graph.add_node("A");
    let b = graph.add_node("B");
    let c = graph.add_node("C");
    let d = graph.add_node("D");
    graph.add_edge(a, &[b]).unwrap();
    graph.add_edge(b, &[c]).unwrap();
    graph.add_edge(c, &[d, a]).unwrap();

    let cycle = graph.topological_sort().unwrap_err();
    assert_eq!(cycle.origin, c);
    assert_eq!(cycle.path, vec![c, a, b]);
    assert_eq!(cycle.to_string(), "cycle detected at node 2: 2 -> 0 -> 1 -> 2");
}
