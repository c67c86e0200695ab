//! Provider ordering for a handler plan.

use std::collections::VecDeque;

use indexmap::IndexMap;
use wirebind_types::TypeKey;

use crate::{
    container::Container,
    error::CompileError,
    executor::{Plan, Step},
    graph::TypeGraph,
};

/// Collects every provider `target` transitively depends on and orders them so each
/// provider runs after all of its inputs.
///
/// Graph edges point from an input type to the type that consumes it; one node (and one
/// execution slot) exists per type.
pub(crate) fn build_plan(container: &Container, target: TypeKey) -> Result<Plan, CompileError> {
    let mut graph: TypeGraph<TypeKey> = TypeGraph::new();
    let mut nodes: IndexMap<TypeKey, usize> = IndexMap::new();
    nodes.insert(target, graph.add_node(target));

    let mut pending = VecDeque::from([target]);
    while let Some(ty) = pending.pop_front() {
        let Some(provider) = container.provider(&ty) else {
            return Err(CompileError::MissingProvider {
                ty: ty.name(),
                needed_by: needed_by(&graph, &nodes, ty, target),
            });
        };
        let consumer = nodes[&ty];
        for input in provider.inputs() {
            let node = match nodes.get(input) {
                Some(node) => *node,
                None => {
                    let node = graph.add_node(*input);
                    nodes.insert(*input, node);
                    pending.push_back(*input);
                    node
                }
            };
            graph.add_edge(node, &[consumer])?;
        }
    }

    let order = graph.topological_sort().map_err(|cycle| CompileError::DependencyCycle {
        path: cycle
            .path
            .iter()
            .filter_map(|node| graph.get(*node).ok())
            .map(TypeKey::name)
            .collect(),
    })?;

    let mut steps = Vec::with_capacity(order.len());
    let mut needs_route_context = false;
    for node in order {
        let ty = *graph.get(node)?;
        let provider = container.provider(&ty).ok_or(CompileError::MissingProvider {
            ty: ty.name(),
            needed_by: target.name(),
        })?;
        let inputs = provider
            .inputs()
            .iter()
            .map(|input| {
                nodes.get(input).copied().ok_or(CompileError::MissingInput {
                    ty: input.name(),
                    record: ty.name(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        needs_route_context |= provider.needs_route_context();
        steps.push(Step::InvokeProvider {
            provider: provider.clone(),
            inputs,
            output: node,
        });
    }

    Ok(Plan::new(target, steps, nodes[&target], graph.len(), needs_route_context))
}

/// The first already-discovered consumer of `ty`, for diagnostics.
fn needed_by(graph: &TypeGraph<TypeKey>, nodes: &IndexMap<TypeKey, usize>, ty: TypeKey, target: TypeKey) -> &'static str {
    nodes
        .get(&ty)
        .and_then(|node| graph.successors(*node).ok()?.next())
        .and_then(|consumer| graph.get(consumer).ok())
        .map_or(target.name(), TypeKey::name)
}
