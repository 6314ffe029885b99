//! Standard node library
//!
//! Built-in adapters for common operations

mod branch;
mod debug;
mod http;
mod time;
mod transform;

pub use branch::{Comparison, IfElseNode};
pub use debug::DebugNode;
pub use http::HttpRequestNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};

use nodeflow_runtime::NodeRegistry;
use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(branch::IfElseNodeFactory));
    registry.register(Arc::new(debug::DebugNodeFactory));
    registry.register(Arc::new(http::HttpRequestNodeFactory));
    registry.register(Arc::new(transform::JsonParseNodeFactory));
    registry.register(Arc::new(transform::JsonStringifyNodeFactory));
    registry.register(Arc::new(time::DelayNodeFactory));
}

/// A registry with every standard node registered
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    registry
}
