//! Error types for the Bitwarden CLI provider.

use bwssh_core::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BwError {
    #[error("bw CLI not available: {0}")]
    Spawn(String),

    #[error("bw {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not logged in")]
    Unauthenticated,

    #[error("unexpected bw output: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<BwError> for StoreError {
    fn from(err: BwError) -> Self {
        match err {
            BwError::Auth(message) => Self::Auth(message),
            BwError::Unauthenticated => {
                Self::Auth("not logged in; run `bw login` first".to_string())
            }
            BwError::Spawn(message) => Self::Unavailable(message),
            BwError::Command { command, message } => {
                Self::Unavailable(format!("bw {command} failed: {message}"))
            }
            BwError::Protocol(message) => Self::Protocol(message),
            BwError::Other(inner) => Self::Other(inner),
        }
    }
}
