use serde::Serialize;
use thiserror::Error;

/// Recoverable per-stage failures. These never abort a run; they are
/// recorded on the outcome they affected and the sweep moves on.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("trend fetch failed: {0}")]
    Fetch(String),
    #[error("store write failed: {0}")]
    Persistence(String),
    #[error("mail dispatch failed: {0}")]
    Dispatch(String),
}

/// Fatal trigger-level failures. Each one aborts the run before any
/// notification is attempted.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("Missing {0}")]
    MissingCredential(&'static str),
    #[error("subscription store unavailable: {0}")]
    Store(String),
}

/// Wire form of a recovered error: a closed kind tag plus the message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

impl StageError {
    pub fn detail(&self) -> ErrorDetail {
        match self {
            StageError::Fetch(message) => ErrorDetail {
                kind: "fetch",
                message: message.clone(),
            },
            StageError::Persistence(message) => ErrorDetail {
                kind: "persistence",
                message: message.clone(),
            },
            StageError::Dispatch(message) => ErrorDetail {
                kind: "dispatch",
                message: message.clone(),
            },
        }
    }
}
