//! Reachability from the entry point

use crate::error::GraphError;
use crate::graph::TypeGraph;
use crate::key::{Kind, TypeKey};
use std::collections::BTreeSet;
use tracing::debug;

/// Every node reachable from `entry`, `entry` included
///
/// Iterative depth-first walk with a visited set, so cycles and
/// self-references terminate and deep chains cannot overflow the stack.
/// Every reachable switch must then have one selector type across its
/// reachable uses.
pub fn reachable_from(graph: &TypeGraph, entry: &TypeKey) -> Result<BTreeSet<TypeKey>, GraphError> {
    if !graph.contains(entry) {
        return Err(GraphError::EntryPointNotFound(entry.to_string()));
    }

    let mut visited = BTreeSet::new();
    let mut stack = vec![entry];

    while let Some(key) = stack.pop() {
        if !visited.insert(key.clone()) {
            continue;
        }
        stack.extend(graph.successors(key).filter(|next| !visited.contains(*next)));
    }

    for switch in visited.iter().filter(|key| key.kind() == Kind::Switch) {
        graph.selector_enum(switch, &visited)?;
    }

    debug!(
        entry = %entry,
        reachable = visited.len(),
        total = graph.node_count(),
        "reachability computed"
    );
    Ok(visited)
}

#[cfg(test)]
#[path = "reach/reach_tests.rs"]
mod reach_tests;
