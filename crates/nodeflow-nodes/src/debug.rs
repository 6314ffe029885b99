use async_trait::async_trait;
use nodeflow_core::{Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{NodeFactory, NodeMetadata, ParamDefinition};
use std::sync::Arc;

/// Logs its resolved parameters and passes them through
pub struct DebugNode;

#[async_trait]
impl Node for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .params
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");

        tracing::info!(node_id = %ctx.node_id, "DEBUG: {}", message);
        ctx.events.info(format!("DEBUG: {}", message));

        for (key, value) in &ctx.params {
            ctx.events.info(format!("  {}: {}", key, value));
        }

        Ok(NodeOutput::new().with_data(Value::Object(ctx.params)))
    }
}

pub struct DebugNodeFactory;

impl NodeFactory for DebugNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(DebugNode)
    }

    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Logs parameter values for debugging".to_string(),
            category: "debug".to_string(),
            params: vec![ParamDefinition::optional("message", "Text to log")],
        }
    }
}
