use async_trait::async_trait;
use nodeflow_core::{Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{NodeFactory, NodeMetadata, ParamDefinition};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .params
            .get("delay_ms")
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(1000.0) as u64;

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        Ok(NodeOutput::new().with_data(Value::Object(ctx.params)))
    }
}

pub struct DelayNodeFactory;

impl NodeFactory for DelayNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(DelayNode)
    }

    fn node_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
            params: vec![ParamDefinition::optional("delay_ms", "Milliseconds to wait (default 1000)")],
        }
    }
}
