use nodeflow_core::{BranchDecision, Edge};
use std::collections::HashSet;

/// Handle naming output port `index` of a node
pub fn output_handle(node_id: &str, index: usize) -> String {
    format!("{}-output-{}", node_id, index)
}

/// Port index named by a `{node_id}-output-{index}` handle
pub fn parse_output_handle(node_id: &str, handle: &str) -> Option<usize> {
    handle
        .strip_prefix(node_id)?
        .strip_prefix("-output-")?
        .parse()
        .ok()
}

/// Successor ids a branch node must not enqueue.
///
/// `decisions` holds one entry per invocation of the node. A port stays live
/// when any invocation took it. Targets of edges leaving dead ports are
/// suppressed unless the same node also reaches them through a live or
/// unlabelled edge. Without a decision for every invocation nothing is
/// suppressed.
pub fn prune_edges(node_id: &str, decisions: &[BranchDecision], edges: &[Edge]) -> HashSet<String> {
    let mut taken = HashSet::new();
    for decision in decisions {
        match decision {
            BranchDecision::Taken(index) => {
                taken.insert(*index);
            }
            BranchDecision::Undecided => return HashSet::new(),
        }
    }
    if taken.is_empty() {
        return HashSet::new();
    }

    let mut inactive = HashSet::new();
    let mut active = HashSet::new();
    for edge in edges.iter().filter(|e| e.source == node_id) {
        let port = edge
            .source_handle
            .as_deref()
            .and_then(|handle| parse_output_handle(node_id, handle));
        match port {
            Some(index) if !taken.contains(&index) => inactive.insert(edge.target.as_str()),
            _ => active.insert(edge.target.as_str()),
        };
    }

    inactive
        .difference(&active)
        .map(|target| target.to_string())
        .collect()
}
