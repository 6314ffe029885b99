use crate::config::HostConfig;
use crate::error::{HostError, ProtocolError};
use crate::protocol::{Channel, ControlMessage, HostMessage};
use nodeflow_core::{EventBus, ExecutionEvent, GraphPayload};
use nodeflow_runtime::{
    unknown_node_types, EngineConfig, GraphAnalysis, NodeRegistry, RunContext, Scheduler,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Idle,
    Initializing,
    Running,
    Finished,
    Failed,
}

impl HostState {
    pub fn can_transition_to(self, next: HostState) -> bool {
        matches!(
            (self, next),
            (HostState::Idle, HostState::Initializing)
                | (HostState::Initializing, HostState::Running)
                | (HostState::Running, HostState::Finished)
                | (HostState::Running, HostState::Failed)
        )
    }
}

/// Why the host stopped. Every variant ends the worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostExit {
    /// `finish` delivered
    Finished,
    /// `error` delivered
    Failed,
    /// Watchdog fired; nothing was delivered
    TimedOut,
    /// Signalled and the run did not complete within the grace window
    Interrupted,
    /// Channel or protocol failure
    Aborted,
}

impl HostExit {
    pub fn code(self) -> i32 {
        match self {
            HostExit::Finished => 0,
            HostExit::Failed => 1,
            HostExit::TimedOut => 2,
            HostExit::Interrupted => 3,
            HostExit::Aborted => 4,
        }
    }
}

/// Serves exactly one run over a message channel
pub struct Host {
    registry: Arc<NodeRegistry>,
    engine: EngineConfig,
    config: HostConfig,
    shutdown: CancellationToken,
    state: HostState,
    started_at: Instant,
}

impl Host {
    pub fn new(registry: Arc<NodeRegistry>, engine: EngineConfig, config: HostConfig) -> Self {
        Self {
            registry,
            engine,
            config,
            shutdown: CancellationToken::new(),
            state: HostState::Idle,
            started_at: Instant::now(),
        }
    }

    /// Cancel this token to ask the host to wind down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn transition(&mut self, next: HostState) -> Result<(), HostError> {
        if !self.state.can_transition_to(next) {
            return Err(HostError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "Host state change");
        self.state = next;
        Ok(())
    }

    /// Run the session under the watchdog and shutdown token
    pub async fn serve<R, W>(mut self, reader: R, writer: W) -> HostExit
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut channel = Channel::new(reader, writer);
        let shutdown = self.shutdown.clone();
        let grace = self.config.shutdown_grace;
        let watchdog = sleep_until(self.started_at + self.config.watchdog);
        tokio::pin!(watchdog);

        let session = self.session(&mut channel);
        tokio::pin!(session);

        let outcome = tokio::select! {
            result = &mut session => result,
            _ = &mut watchdog => {
                warn!("Watchdog expired, stopping host");
                return HostExit::TimedOut;
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, waiting up to {:?} for the run", grace);
                tokio::select! {
                    result = &mut session => result,
                    _ = sleep(grace) => {
                        warn!("Grace window elapsed, stopping host");
                        return HostExit::Interrupted;
                    }
                    _ = &mut watchdog => {
                        warn!("Watchdog expired, stopping host");
                        return HostExit::TimedOut;
                    }
                }
            }
        };

        match outcome {
            Ok(exit) => exit,
            Err(e) => {
                error!("Host aborted: {}", e);
                HostExit::Aborted
            }
        }
    }

    async fn session<R, W>(&mut self, channel: &mut Channel<R, W>) -> Result<HostExit, HostError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let ControlMessage::Start(payload) = channel
            .recv::<ControlMessage>()
            .await?
            .ok_or(ProtocolError::Closed)?;
        channel.send(&HostMessage::Started).await?;

        self.transition(HostState::Initializing)?;
        let ctx = self.initialize(&payload);

        self.transition(HostState::Running)?;
        let result = Scheduler::new(&ctx).execute(&payload).await;

        match result {
            Ok(executed) => {
                self.transition(HostState::Finished)?;
                info!(run_id = %ctx.run_id(), records = executed.len(), "Run finished");
                channel.send(&HostMessage::Finish(executed)).await?;
                Ok(HostExit::Finished)
            }
            Err(failure) => {
                self.transition(HostState::Failed)?;
                info!(run_id = %ctx.run_id(), node_id = %failure.node_id, "Run failed");
                channel.send(&HostMessage::Error(failure)).await?;
                Ok(HostExit::Failed)
            }
        }
    }

    /// Build the run context owned by this host
    fn initialize(&self, payload: &GraphPayload) -> RunContext {
        let event_bus = Arc::new(EventBus::new(self.config.event_buffer_size));
        spawn_event_logger(event_bus.subscribe());

        for warning in GraphAnalysis::analyze(payload).warnings() {
            warn!("Graph: {}", warning);
        }
        for unknown in unknown_node_types(payload, &self.registry) {
            warn!("Graph: {}, it will be skipped", unknown);
        }

        RunContext::new(self.registry.clone(), self.engine.clone())
            .with_event_bus(event_bus)
            .with_cancellation(self.shutdown.child_token())
    }
}

fn spawn_event_logger(mut events: broadcast::Receiver<ExecutionEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ExecutionEvent::NodeEvent { node_id, event, .. }) => {
                    debug!(node_id = %node_id, event = ?event, "Node event");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Cancel `token` on SIGINT or SIGTERM
pub fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
