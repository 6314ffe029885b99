use thiserror::Error;

/// Failure loading a payload
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a node adapter. Any of these aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter type for '{field}': expected {expected}, got {actual}")]
    InvalidParameterType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problem in a payload. The scheduler tolerates all of these
/// by skipping, so they are reported rather than raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Starting node '{0}' does not exist")]
    UnknownRoot(String),

    #[error("Edge {from} -> {to} references a missing node")]
    DanglingEdge { from: String, to: String },

    #[error("Node '{node_id}' has unknown type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },
}
