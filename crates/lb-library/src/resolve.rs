//! Dependency ordering of libraries.

use std::collections::{HashMap, HashSet, VecDeque};

use lb_core::LibraryId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{LibraryError, LibraryResult};

/// Order `roots` and everything reachable from them so that each library
/// comes after all libraries it depends on.
///
/// Discovery is breadth first; an id is marked as discovered before it is
/// queued, so every library appears once. Among libraries whose
/// dependencies are all placed, the earliest discovered goes first.
pub fn dependency_order<F>(roots: &[LibraryId], mut deps_of: F) -> LibraryResult<Vec<LibraryId>>
where
    F: FnMut(&LibraryId) -> LibraryResult<Vec<LibraryId>>,
{
    let mut graph: DiGraph<LibraryId, ()> = DiGraph::new();
    let mut nodes: HashMap<LibraryId, NodeIndex> = HashMap::new();
    let mut queue: VecDeque<LibraryId> = VecDeque::new();

    for root in roots {
        if !nodes.contains_key(root) {
            nodes.insert(root.clone(), graph.add_node(root.clone()));
            queue.push_back(root.clone());
        }
    }

    // edges point from a library to its dependencies
    while let Some(id) = queue.pop_front() {
        let from = nodes[&id];
        for dep in deps_of(&id)? {
            let to = match nodes.get(&dep) {
                Some(&n) => n,
                None => {
                    let n = graph.add_node(dep.clone());
                    nodes.insert(dep.clone(), n);
                    queue.push_back(dep);
                    n
                }
            };
            graph.update_edge(from, to, ());
        }
    }

    // node indices follow discovery order
    let mut placed: HashSet<NodeIndex> = HashSet::with_capacity(graph.node_count());
    let mut order = Vec::with_capacity(graph.node_count());
    while order.len() < graph.node_count() {
        let next = graph.node_indices().find(|&n| {
            !placed.contains(&n) && graph.neighbors(n).all(|dep| placed.contains(&dep))
        });
        let Some(n) = next else {
            return Err(cycle_error(&graph));
        };
        placed.insert(n);
        order.push(graph[n].clone());
    }
    Ok(order)
}

fn cycle_error(graph: &DiGraph<LibraryId, ()>) -> LibraryError {
    let mut libraries: Vec<LibraryId> = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| scc.into_iter().map(|n| graph[n].clone()).collect())
        .unwrap_or_default();
    libraries.sort();
    tracing::warn!(?libraries, "dependency cycle");
    LibraryError::DependencyCycle { libraries }
}
