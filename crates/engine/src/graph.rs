//! Append-only directed graph with deterministic topological ordering.
//!
//! Nodes live in an arena and are addressed by the index returned from [`TypeGraph::add_node`].
//! An edge `a -> b` means `a` must come before `b`; [`TypeGraph::topological_sort`] returns an order in which
//! every edge points forward, or a [`CycleError`] naming the node where a cycle was first detected.

use std::collections::{BTreeSet, btree_set};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node index {index} is out of range for a graph of {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// A cycle found while sorting.
///
/// `path` starts at `origin` and lists the cycle members in edge order back to it.
/// `partial` holds the nodes that were already ordered when the cycle was hit; it is
/// only meaningful for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle detected at node {origin}: {}", render_path(.path, .origin))]
pub struct CycleError {
    pub origin: usize,
    pub path: Vec<usize>,
    pub partial: Vec<usize>,
}

fn render_path(path: &[usize], origin: &usize) -> String {
    let mut rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
    rendered.push(origin.to_string());
    rendered.join(" -> ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unmarked,
    InProgress,
    Permanent,
}

#[derive(Debug, Clone)]
pub struct TypeGraph<T> {
    nodes: Vec<T>,
    edges_from_to: Vec<BTreeSet<usize>>,
    edges_to_from: Vec<BTreeSet<usize>>,
}

impl<T> Default for TypeGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges_from_to: Vec::new(),
            edges_to_from: Vec::new(),
        }
    }

    /// Appends a node and returns its index. Indices are never reused.
    pub fn add_node(&mut self, payload: T) -> usize {
        self.nodes.push(payload);
        self.edges_from_to.push(BTreeSet::new());
        self.edges_to_from.push(BTreeSet::new());
        self.nodes.len() - 1
    }

    /// Adds `from -> to` for every target. Nothing is inserted unless every index is valid.
    pub fn add_edge(&mut self, from: usize, to: &[usize]) -> Result<(), GraphError> {
        self.check_index(from)?;
        for &target in to {
            self.check_index(target)?;
        }
        for &target in to {
            self.edges_from_to[from].insert(target);
            self.edges_to_from[target].insert(from);
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&T, GraphError> {
        self.nodes.get(index).ok_or(GraphError::IndexOutOfRange {
            index,
            len: self.nodes.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (usize, &T)> {
        self.nodes.iter().enumerate()
    }

    pub fn successors(&self, index: usize) -> Result<impl Iterator<Item = usize> + '_, GraphError> {
        self.check_index(index)?;
        Ok(self.edges_from_to[index].iter().copied())
    }

    pub fn predecessors(&self, index: usize) -> Result<impl Iterator<Item = usize> + '_, GraphError> {
        self.check_index(index)?;
        Ok(self.edges_to_from[index].iter().copied())
    }

    /// Orders all nodes so that for every edge `a -> b`, `a` precedes `b`.
    ///
    /// Roots are visited in index order and successors in ascending order, so the result is
    /// deterministic for a given insertion sequence.
    pub fn topological_sort(&self) -> Result<Vec<usize>, CycleError> {
        let mut marks = vec![Mark::Unmarked; self.nodes.len()];
        let mut finished = Vec::with_capacity(self.nodes.len());

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unmarked {
                continue;
            }
            marks[root] = Mark::InProgress;
            let mut stack: Vec<(usize, btree_set::Iter<'_, usize>)> = vec![(root, self.edges_from_to[root].iter())];

            while let Some((node, successors)) = stack.last_mut() {
                let node = *node;
                match successors.next().copied() {
                    Some(next) => match marks[next] {
                        Mark::Permanent => {}
                        Mark::Unmarked => {
                            marks[next] = Mark::InProgress;
                            stack.push((next, self.edges_from_to[next].iter()));
                        }
                        Mark::InProgress => {
                            let start = stack.iter().position(|(member, _)| *member == next).unwrap_or(0);
                            let mut path = Vec::with_capacity(stack.len() - start);
                            path.push(node);
                            path.extend(stack[start..stack.len() - 1].iter().map(|(member, _)| *member));
                            finished.reverse();
                            return Err(CycleError {
                                origin: node,
                                path,
                                partial: finished,
                            });
                        }
                    },
                    None => {
                        marks[node] = Mark::Permanent;
                        finished.push(node);
                        stack.pop();
                    }
                }
            }
        }

        finished.reverse();
        Ok(finished)
    }

    fn check_index(&self, index: usize) -> Result<(), GraphError> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(names: &[&'static str]) -> TypeGraph<&'static str> {
        let mut graph = TypeGraph::new();
        for name in names {
            graph.add_node(*name);
        }
        graph
    }

    fn position(order: &[usize], node: usize) -> usize {
        order.iter().position(|entry| *entry == node).expect("node present in order")
    }

    #[test]
    fn sorts_dependencies_before_dependents() {
        let mut graph = graph_of(&["a", "b", "c", "d"]);
        graph.add_edge(0, &[1, 2]).unwrap();
        graph.add_edge(2, &[3]).unwrap();
        graph.add_edge(1, &[3]).unwrap();

        let order = graph.topological_sort().unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, 0) < position(&order, 1));
        assert!(position(&order, 0) < position(&order, 2));
        assert!(position(&order, 2) < position(&order, 3));
        assert!(position(&order, 1) < position(&order, 3));
    }

    #[test]
    fn order_is_deterministic() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.add_edge(2, &[0]).unwrap();
        assert_eq!(graph.topological_sort().unwrap(), vec![2, 1, 0]);
        assert_eq!(graph.topological_sort().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn reports_cycle_source_and_path() {
        let mut graph = graph_of(&["A", "B", "C", "D"]);
        graph.add_edge(0, &[1]).unwrap();
        graph.add_edge(1, &[2]).unwrap();
        graph.add_edge(2, &[3]).unwrap();
        graph.add_edge(2, &[0]).unwrap();

        let error = graph.topological_sort().unwrap_err();
        assert_eq!(*graph.get(error.origin).unwrap(), "C");
        assert_eq!(error.path, vec![2, 0, 1]);
        assert!(error.to_string().contains("2 -> 0 -> 1 -> 2"));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = graph_of(&["solo"]);
        graph.add_edge(0, &[0]).unwrap();
        let error = graph.topological_sort().unwrap_err();
        assert_eq!(error.origin, 0);
        assert_eq!(error.path, vec![0]);
    }

    #[test]
    fn cycle_error_keeps_partial_order() {
        let mut graph = graph_of(&["leaf", "x", "y"]);
        graph.add_edge(1, &[2]).unwrap();
        graph.add_edge(2, &[1]).unwrap();
        let error = graph.topological_sort().unwrap_err();
        assert_eq!(error.partial, vec![0]);
    }

    #[test]
    fn rejects_out_of_range_edges_without_partial_insert() {
        let mut graph = graph_of(&["a", "b"]);
        let error = graph.add_edge(0, &[1, 5]).unwrap_err();
        assert_eq!(error, GraphError::IndexOutOfRange { index: 5, len: 2 });
        assert_eq!(graph.successors(0).unwrap().count(), 0);
        assert!(matches!(graph.add_edge(9, &[0]), Err(GraphError::IndexOutOfRange { index: 9, .. })));
        assert!(graph.get(2).is_err());
    }

    #[test]
    fn keeps_edge_maps_symmetric() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.add_edge(0, &[2]).unwrap();
        graph.add_edge(1, &[2]).unwrap();
        assert_eq!(graph.predecessors(2).unwrap().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(graph.successors(0).unwrap().collect::<Vec<_>>(), vec![2]);
    }
}
