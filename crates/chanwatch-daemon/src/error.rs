//! Error types for the chanwatch daemon.

use crate::config::ConfigError;
use chanwatch_presence::PresenceError;

/// Errors that stop the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("presence error: {0}")]
    Presence(#[from] PresenceError),

    #[error("transition source I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transition source task failed: {0}")]
    SourceTask(#[from] tokio::task::JoinError),
}
