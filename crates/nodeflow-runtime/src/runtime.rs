use crate::registry::NodeRegistry;
use nodeflow_core::{EventBus, ExecutionEvent, RunId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tunables for graph traversal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Re-visits allowed per node id before a cycle is cut
    pub max_loop: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_loop: 3 }
    }
}

/// Everything one run needs, built once by the host and passed down
pub struct RunContext {
    run_id: RunId,
    config: EngineConfig,
    registry: Arc<NodeRegistry>,
    event_bus: Arc<EventBus>,
    cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            registry,
            event_bus: Arc::new(EventBus::default()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Token adapters observe when the host is shutting down
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }
}
