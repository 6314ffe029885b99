use std::path::PathBuf;
use std::time::Duration;

/// Limits for one worker process
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Hard limit measured from host start
    pub watchdog: Duration,
    /// How long a signalled host waits for the run before giving up
    pub shutdown_grace: Duration,
    pub event_buffer_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(50),
            shutdown_grace: Duration::from_secs(5),
            event_buffer_size: 1000,
        }
    }
}

/// How the controller launches and waits on a worker
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Silence past this point counts as a failed run
    pub timeout: Duration,
}

impl ControllerConfig {
    /// Worker command with a timeout covering its watchdog and grace window
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, host: &HostConfig) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: host.watchdog + host.shutdown_grace,
        }
    }
}
