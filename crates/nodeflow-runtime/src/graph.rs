use crate::registry::NodeRegistry;
use nodeflow_core::{GraphPayload, WorkflowError};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::{HashMap, HashSet};

/// Structural report on a payload. Cycles are legal; everything here is
/// advisory and never stops a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphAnalysis {
    pub node_count: usize,
    pub edge_count: usize,
    /// Starting ids with no matching node
    pub unknown_roots: Vec<String>,
    /// Adjacency entries naming a node that does not exist, as (source, target)
    pub dangling: Vec<(String, String)>,
    /// Nodes that sit on at least one cycle
    pub cyclic_nodes: Vec<String>,
    /// Nodes no starting node can reach
    pub unreachable: Vec<String>,
}

impl GraphAnalysis {
    pub fn analyze(payload: &GraphPayload) -> Self {
        let adjacency = payload.adjacency();
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for node in &payload.nodes {
            index
                .entry(node.id.as_str())
                .or_insert_with(|| graph.add_node(node.id.as_str()));
        }

        let mut dangling = Vec::new();
        let mut sources: Vec<&String> = adjacency.keys().collect();
        sources.sort();
        for source in sources {
            for target in &adjacency[source] {
                match (index.get(source.as_str()), index.get(target.as_str())) {
                    (Some(from), Some(to)) => {
                        graph.add_edge(*from, *to, ());
                    }
                    _ => dangling.push((source.clone(), target.clone())),
                }
            }
        }

        let mut cyclic_nodes = Vec::new();
        if is_cyclic_directed(&graph) {
            for component in tarjan_scc(&graph) {
                let on_cycle = component.len() > 1
                    || graph.find_edge(component[0], component[0]).is_some();
                if on_cycle {
                    cyclic_nodes.extend(component.iter().map(|ix| graph[*ix].to_string()));
                }
            }
        }
        cyclic_nodes.sort();

        let mut unknown_roots = Vec::new();
        let mut reached: HashSet<NodeIndex> = HashSet::new();
        for root in &payload.starting_node_ids {
            let Some(start) = index.get(root.as_str()) else {
                unknown_roots.push(root.clone());
                continue;
            };
            let mut bfs = Bfs::new(&graph, *start);
            while let Some(ix) = bfs.next(&graph) {
                reached.insert(ix);
            }
        }

        let mut unreachable: Vec<String> = graph
            .node_indices()
            .filter(|ix| !reached.contains(ix))
            .map(|ix| graph[ix].to_string())
            .collect();
        unreachable.sort();

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            unknown_roots,
            dangling,
            cyclic_nodes,
            unreachable,
        }
    }

    pub fn has_cycles(&self) -> bool {
        !self.cyclic_nodes.is_empty()
    }

    /// Missing roots and dangling edges
    pub fn errors(&self) -> Vec<WorkflowError> {
        let roots = self
            .unknown_roots
            .iter()
            .map(|root| WorkflowError::UnknownRoot(root.clone()));
        let edges = self.dangling.iter().map(|(from, to)| WorkflowError::DanglingEdge {
            from: from.clone(),
            to: to.clone(),
        });
        roots.chain(edges).collect()
    }

    /// Every finding as a line of text, structural errors first
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self.errors().iter().map(ToString::to_string).collect();
        if self.has_cycles() {
            warnings.push(format!(
                "cycle through {} (bounded by the loop budget)",
                self.cyclic_nodes.join(", ")
            ));
        }
        for node in &self.unreachable {
            warnings.push(format!("node '{}' is unreachable from the starting nodes", node));
        }
        warnings
    }
}

/// Nodes whose adapter type is not registered, in payload order
pub fn unknown_node_types(payload: &GraphPayload, registry: &NodeRegistry) -> Vec<WorkflowError> {
    payload
        .nodes
        .iter()
        .filter(|node| !registry.contains(&node.name))
        .map(|node| WorkflowError::UnknownNodeType {
            node_id: node.id.clone(),
            node_type: node.name.clone(),
        })
        .collect()
}
