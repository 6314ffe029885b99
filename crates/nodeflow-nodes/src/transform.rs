use async_trait::async_trait;
use nodeflow_core::{Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{NodeFactory, NodeMetadata, ParamDefinition};
use serde_json::json;
use std::sync::Arc;

/// Parse a JSON string into a structured value
pub struct JsonParseNode;

#[async_trait]
impl Node for JsonParseNode {
    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_str("json")?;

        let parsed: Value = serde_json::from_str(input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_data(json!({ "parsed": parsed })))
    }
}

pub struct JsonParseNodeFactory;

impl NodeFactory for JsonParseNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(JsonParseNode)
    }

    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
            params: vec![ParamDefinition::required("json", "JSON text to parse")],
        }
    }
}

/// Render any value as JSON text
pub struct JsonStringifyNode;

#[async_trait]
impl Node for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_param("value")?;
        let pretty = ctx
            .params
            .get("pretty")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let rendered = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_data(json!({ "json": rendered })))
    }
}

pub struct JsonStringifyNodeFactory;

impl NodeFactory for JsonStringifyNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(JsonStringifyNode)
    }

    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Convert value to JSON string".to_string(),
            category: "transform".to_string(),
            params: vec![
                ParamDefinition::required("value", "Value to render"),
                ParamDefinition::optional("pretty", "Indent the output"),
            ],
        }
    }
}
