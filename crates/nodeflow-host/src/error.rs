use crate::host::HostState;
use std::time::Duration;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Channel closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: HostState, to: HostState },
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Worker exited without reporting a result")]
    WorkerLost,

    #[error("Worker silent for {0:?}")]
    TimedOut(Duration),
}
