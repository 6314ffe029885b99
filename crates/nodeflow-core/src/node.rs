use crate::{events::EventEmitter, NodeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

/// Core trait that all node adapters implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique type identifier (e.g., "http.request", "control.if_else")
    fn node_type(&self) -> &str;

    /// Execute the node once with one set of resolved parameters
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Branch nodes select which of their `{id}-output-{n}` ports stay live.
    fn is_branch(&self) -> bool {
        false
    }
}

/// Execution context passed to each adapter invocation
#[derive(Clone)]
pub struct NodeContext {
    /// Id of the node in the graph
    pub node_id: String,

    /// Human label of the node
    pub label: String,

    /// Parameters after variable resolution for this iteration
    pub params: Map<String, Value>,

    /// Loop iteration, `None` when the node is not loop-expanded
    pub iteration: Option<usize>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancelled when the host is winding down
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>, events: EventEmitter) -> Self {
        let node_id = node_id.into();
        Self {
            label: node_id.clone(),
            node_id,
            params: Map::new(),
            iteration: None,
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get required parameter or return error
    pub fn require_param(&self, name: &str) -> Result<&Value, NodeError> {
        self.params
            .get(name)
            .ok_or_else(|| NodeError::MissingParameter(name.to_string()))
    }

    /// Get a required string parameter
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_param(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidParameterType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: json_type_name(value).to_string(),
        })
    }

    /// Get parameter with default
    pub fn get_param_or(&self, name: &str, default: Value) -> Value {
        self.params.get(name).cloned().unwrap_or(default)
    }
}

/// Which output port a branch node took for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum BranchDecision {
    /// No explicit choice; every outgoing edge stays live
    #[default]
    Undecided,
    Taken(usize),
}

/// Output from one adapter invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Result records, appended to the node's executed record in order
    pub records: Vec<Value>,

    #[serde(default)]
    pub branch: BranchDecision,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: Value) -> Self {
        self.records.push(record);
        self
    }

    /// Append a record in the `{"data": ...}` shape
    pub fn with_data(self, data: Value) -> Self {
        self.with_record(json!({ "data": data }))
    }

    pub fn with_branch(mut self, index: usize) -> Self {
        self.branch = BranchDecision::Taken(index);
        self
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
