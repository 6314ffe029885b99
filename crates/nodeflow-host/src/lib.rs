//! Process boundary around the graph scheduler
//!
//! A run executes inside an isolated worker process. The controller starts
//! the worker, sends it a `start` message carrying the graph, and waits for
//! exactly one `finish` or `error` reply over newline-delimited JSON.

mod config;
mod controller;
mod error;
mod host;
mod protocol;

pub use config::{ControllerConfig, HostConfig};
pub use controller::{drive, Controller, RunOutcome};
pub use error::{ControllerError, HostError, ProtocolError};
pub use host::{spawn_signal_listener, Host, HostExit, HostState};
pub use protocol::{Channel, ControlMessage, HostMessage};
