use crate::config::ControllerConfig;
use crate::error::{ControllerError, ProtocolError};
use crate::protocol::{Channel, ControlMessage, HostMessage};
use nodeflow_core::{ExecutedRecord, GraphPayload};
use nodeflow_runtime::RunFailure;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Result reported by a worker
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished(Vec<ExecutedRecord>),
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn executed(&self) -> &[ExecutedRecord] {
        match self {
            RunOutcome::Finished(executed) => executed,
            RunOutcome::Failed(failure) => &failure.executed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Finished(_))
    }
}

/// Send `start` and wait for the terminal reply on an open channel
pub async fn drive<R, W>(
    reader: R,
    writer: W,
    payload: &GraphPayload,
) -> Result<RunOutcome, ControllerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut channel = Channel::new(reader, writer);
    channel
        .send(&ControlMessage::Start(payload.clone()))
        .await?;

    loop {
        match channel.recv::<HostMessage>().await {
            Ok(Some(HostMessage::Started)) => debug!("Worker acknowledged start"),
            Ok(Some(HostMessage::Finish(executed))) => return Ok(RunOutcome::Finished(executed)),
            Ok(Some(HostMessage::Error(failure))) => return Ok(RunOutcome::Failed(failure)),
            Ok(None) | Err(ProtocolError::Closed) => return Err(ControllerError::WorkerLost),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Launches one worker process per run
pub struct Controller {
    config: ControllerConfig,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub async fn run(&self, payload: &GraphPayload) -> Result<RunOutcome, ControllerError> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ControllerError::Spawn)?;

        info!(
            program = %self.config.program.display(),
            pid = ?child.id(),
            "Worker started"
        );

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill().await;
            return Err(ControllerError::WorkerLost);
        };

        let deadline = Instant::now() + self.config.timeout;
        let result = match timeout_at(deadline, drive(stdout, stdin, payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Worker exceeded {:?}, killing it", self.config.timeout);
                let _ = child.kill().await;
                return Err(ControllerError::TimedOut(self.config.timeout));
            }
        };

        if let Err(e) = &result {
            warn!("Worker session broke off: {}, killing it", e);
            let _ = child.kill().await;
            return result;
        }

        match timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Worker exited"),
            Ok(Err(e)) => warn!("Failed to reap worker: {}", e),
            Err(_) => {
                warn!("Worker still running after reporting, killing it");
                let _ = child.kill().await;
            }
        }
        result
    }
}
