// Test adapters shared by the runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nodeflow_core::{Map, Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{EngineConfig, NodeFactory, NodeRegistry, RunContext};
use std::sync::{Arc, Mutex};

/// Records the parameters of every invocation and echoes them back
pub struct RecordingNode {
    node_type: &'static str,
    pub calls: Mutex<Vec<(Option<usize>, Map<String, Value>)>>,
}

impl RecordingNode {
    pub fn new(node_type: &'static str) -> Arc<Self> {
        Arc::new(Self {
            node_type,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(Option<usize>, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Node for RecordingNode {
    fn node_type(&self) -> &str {
        self.node_type
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.iteration, ctx.params.clone()));
        Ok(NodeOutput::new().with_data(Value::Object(ctx.params)))
    }
}

/// Fails on one loop iteration, succeeds otherwise
pub struct FailingNode {
    pub fail_on: usize,
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl Node for FailingNode {
    fn node_type(&self) -> &str {
        "test.fail"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        *self.attempts.lock().unwrap() += 1;
        if ctx.iteration == Some(self.fail_on) {
            return Err(NodeError::ExecutionFailed(format!(
                "iteration {} exploded",
                self.fail_on
            )));
        }
        Ok(NodeOutput::new().with_data(Value::from(ctx.iteration.unwrap_or(0) as u64)))
    }
}

/// Branch node taking the port named by its `take` parameter, if any
pub struct ChoiceNode;

#[async_trait]
impl Node for ChoiceNode {
    fn node_type(&self) -> &str {
        "test.choice"
    }

    fn is_branch(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let output = NodeOutput::new().with_data(Value::Object(ctx.params.clone()));
        match ctx.params.get("take").and_then(Value::as_u64) {
            Some(index) => Ok(output.with_branch(index as usize)),
            None => Ok(output),
        }
    }
}

/// Hands out one shared adapter instance
pub struct SharedFactory {
    pub node_type: &'static str,
    pub node: Arc<dyn Node>,
}

impl NodeFactory for SharedFactory {
    fn create(&self) -> Arc<dyn Node> {
        self.node.clone()
    }

    fn node_type(&self) -> &str {
        self.node_type
    }
}

pub fn register(registry: &mut NodeRegistry, node_type: &'static str, node: Arc<dyn Node>) {
    registry.register(Arc::new(SharedFactory { node_type, node }));
}

pub fn context(registry: NodeRegistry) -> RunContext {
    RunContext::new(Arc::new(registry), EngineConfig::default())
}

pub fn executed_ids(records: &[nodeflow_core::ExecutedRecord]) -> Vec<&str> {
    records.iter().map(|r| r.node_id.as_str()).collect()
}
