use async_trait::async_trait;
use nodeflow_core::{Map, Node, NodeContext, NodeError, NodeOutput, Value};
use nodeflow_runtime::{NodeFactory, NodeMetadata, ParamDefinition};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http.request"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let url = ctx.require_str("url")?;
        let method_value = ctx.get_param_or("method", Value::String("GET".to_string()));
        let method = method_value.as_str().unwrap_or("GET");

        ctx.events.info(format!("{} {}", method, url));

        let request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "DELETE" => self.client.delete(url),
            "POST" => with_body(self.client.post(url), ctx.params.get("body")),
            "PUT" => with_body(self.client.put(url), ctx.params.get("body")),
            "PATCH" => with_body(self.client.patch(url), ctx.params.get("body")),
            _ => return Err(NodeError::Configuration(format!("Unsupported method: {}", method))),
        };

        let timeout_ms = ctx.params.get("timeout_ms").and_then(Value::as_u64);
        let request = match timeout_ms {
            Some(millis) => request.timeout(Duration::from_millis(millis)),
            None => request,
        };

        let request = match ctx.params.get("headers") {
            Some(Value::Object(headers)) => headers.iter().fold(request, |req, (key, value)| {
                match value.as_str() {
                    Some(val) => req.header(key, val),
                    None => req,
                }
            }),
            _ => request,
        };

        let response = tokio::select! {
            response = request.send() => response.map_err(|e| match timeout_ms {
                Some(millis) if e.is_timeout() => NodeError::Timeout { millis },
                _ => NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)),
            })?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        // JSON bodies stay structured so later nodes can address into them
        let body = serde_json::from_str(&body_text).unwrap_or(Value::String(body_text));

        if (200..300).contains(&status) {
            ctx.events.info(format!("Response status: {}", status));
        } else {
            ctx.events.warn(format!("Response status: {}", status));
        }

        Ok(NodeOutput::new().with_data(json!({
            "status": status,
            "body": body,
            "headers": headers,
        })))
    }
}

fn with_body(request: reqwest::RequestBuilder, body: Option<&Value>) -> reqwest::RequestBuilder {
    match body {
        Some(Value::String(text)) => request.body(text.clone()),
        Some(Value::Null) | None => request,
        Some(json) => request.json(json),
    }
}

pub struct HttpRequestNodeFactory;

impl NodeFactory for HttpRequestNodeFactory {
    fn create(&self) -> Arc<dyn Node> {
        Arc::new(HttpRequestNode::new())
    }

    fn node_type(&self) -> &str {
        "http.request"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
            params: vec![
                ParamDefinition::required("url", "Request URL"),
                ParamDefinition::optional("method", "GET, POST, PUT, PATCH or DELETE"),
                ParamDefinition::optional("headers", "Object of header values"),
                ParamDefinition::optional("body", "Text or JSON body"),
                ParamDefinition::optional("timeout_ms", "Fail the request after this many milliseconds"),
            ],
        }
    }
}
