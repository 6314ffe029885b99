use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Adjacency list keyed by node id, successors in edge order
pub type Adjacency = HashMap<String, Vec<String>>;

/// Node specification in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    /// Adapter type used to look the node up in the registry
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Edge leaving output port `index` of the source node
    pub fn from_output(source: impl Into<String>, index: usize, target: impl Into<String>) -> Self {
        let source = source.into();
        let handle = format!("{}-output-{}", source, index);
        Self {
            source,
            target: target.into(),
            source_handle: Some(handle),
            target_handle: None,
        }
    }
}

/// Everything a run needs, as handed over by the graph resolution layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPayload {
    pub starting_node_ids: Vec<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Precomputed adjacency; derived from `edges` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Adjacency>,
    /// Records accumulated by an earlier host, for continuation
    #[serde(default)]
    pub executed: Vec<ExecutedRecord>,
}

impl GraphPayload {
    pub fn new(starting_node_ids: Vec<String>) -> Self {
        Self {
            starting_node_ids,
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.edges.push(Edge::new(source, target));
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a payload file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The adjacency used for traversal
    pub fn adjacency(&self) -> Adjacency {
        match &self.graph {
            Some(graph) => graph.clone(),
            None => adjacency_from_edges(&self.nodes, &self.edges),
        }
    }
}

/// Build successor lists in edge order, one entry per node
pub fn adjacency_from_edges(nodes: &[NodeSpec], edges: &[Edge]) -> Adjacency {
    let mut graph: Adjacency = nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();
    for edge in edges {
        graph
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
    }
    graph
}

/// Results of one executed node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedRecord {
    pub node_id: String,
    pub node_label: String,
    pub data: Vec<Value>,
}

impl ExecutedRecord {
    pub fn new(node_id: impl Into<String>, node_label: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            node_id: node_id.into(),
            node_label: node_label.into(),
            data,
        }
    }

    /// Record for a node whose adapter failed
    pub fn failed(node_id: impl Into<String>, node_label: impl Into<String>, error: &str) -> Self {
        Self::new(node_id, node_label, vec![json!({ "error": error })])
    }

    /// The error text if this record marks a failure
    pub fn error(&self) -> Option<&str> {
        match self.data.as_slice() {
            [record] => record.get("error").and_then(Value::as_str),
            _ => None,
        }
    }
}
