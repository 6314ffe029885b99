//! Core abstractions for the nodeflow engine
//!
//! This crate provides the data model handed to the engine by the graph
//! resolution layer, the adapter trait every node implements, and the
//! execution events emitted while a run is in progress.

mod error;
pub mod events;
mod node;
pub mod path;
mod workflow;

pub use error::{FlowError, NodeError, WorkflowError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, NodeEvent, RunId};
pub use node::{BranchDecision, Node, NodeContext, NodeOutput};
pub use workflow::{Adjacency, Edge, ExecutedRecord, GraphPayload, NodeSpec};

/// Parameter values and result records are plain JSON trees
pub use serde_json::{Map, Value};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
