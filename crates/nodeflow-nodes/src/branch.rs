use async_trait::async_trait;
use nodeflow_core::{Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{NodeFactory, NodeMetadata, ParamDefinition};
use serde_json::json;
use std::sync::Arc;

/// Port taken when the comparison holds
pub const TRUE_PORT: usize = 0;
/// Port taken when it does not
pub const FALSE_PORT: usize = 1;

/// Comparison applied by the if/else node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Contains,
    NotContains,
    Larger,
    LargerEqual,
    Smaller,
    SmallerEqual,
    IsEmpty,
    NotEmpty,
}

impl Comparison {
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "equal" => Comparison::Equal,
            "not_equal" => Comparison::NotEqual,
            "contains" => Comparison::Contains,
            "not_contains" => Comparison::NotContains,
            "larger" => Comparison::Larger,
            "larger_equal" => Comparison::LargerEqual,
            "smaller" => Comparison::Smaller,
            "smaller_equal" => Comparison::SmallerEqual,
            "is_empty" => Comparison::IsEmpty,
            "not_empty" => Comparison::NotEmpty,
            _ => return None,
        };
        Some(op)
    }

    pub fn evaluate(&self, left: &Value, right: &Value) -> bool {
        match self {
            Comparison::Equal => text(left) == text(right),
            Comparison::NotEqual => text(left) != text(right),
            Comparison::Contains => contains(left, right),
            Comparison::NotContains => !contains(left, right),
            Comparison::Larger => compare(left, right, |a, b| a > b),
            Comparison::LargerEqual => compare(left, right, |a, b| a >= b),
            Comparison::Smaller => compare(left, right, |a, b| a < b),
            Comparison::SmallerEqual => compare(left, right, |a, b| a <= b),
            Comparison::IsEmpty => is_empty(left),
            Comparison::NotEmpty => !is_empty(left),
        }
    }
}

// Resolved parameters are often text even for numbers, so compare on text
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value, op: fn(f64, f64) -> bool) -> bool {
    match (number(left), number(right)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| text(item) == text(needle)),
        other => text(other).contains(&text(needle)),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Two-way branch.
///
/// Emits one record per port, in port order: the taken port carries the
/// compared values, the other an empty `data` object. The taken port is
/// also reported explicitly so routing never depends on record shape.
pub struct IfElseNode;

#[async_trait]
impl Node for IfElseNode {
    fn node_type(&self) -> &str {
        "control.if_else"
    }

    fn is_branch(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let operation = ctx.require_str("operation")?;
        let comparison = Comparison::parse(operation)
            .ok_or_else(|| NodeError::Configuration(format!("Unknown operation: {}", operation)))?;
        let left = ctx.get_param_or("value1", Value::Null);
        let right = ctx.get_param_or("value2", Value::Null);

        let holds = comparison.evaluate(&left, &right);
        tracing::debug!(node_id = %ctx.node_id, operation, holds, "Evaluated condition");

        let taken = json!({ "value1": left, "value2": right, "result": holds });
        let (on_true, on_false, port) = if holds {
            (taken, json!({}), TRUE_PORT)
        } else {
            (json!({}), taken, FALSE_PORT)
        };

        Ok(NodeOutput::new()
            .with_data(on_true)
            .with_data(on_false)
            .with_branch(port))
    }
}

pub struct IfElseNodeFactory;

impl NodeFactory for IfElseNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(IfElseNode)
    }

    fn node_type(&self) -> &str {
        "control.if_else"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Route to output 0 when the comparison holds, output 1 otherwise"
                .to_string(),
            category: "control".to_string(),
            params: vec![
                ParamDefinition::required("operation", "equal, not_equal, contains, not_contains, larger, larger_equal, smaller, smaller_equal, is_empty, not_empty"),
                ParamDefinition::optional("value1", "Left-hand value"),
                ParamDefinition::optional("value2", "Right-hand value"),
            ],
        }
    }
}
