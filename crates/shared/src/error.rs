use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::EntryPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    Reverted,
    Transport,
    Decode,
}

/// Failure of a single read. Scoped to that one call; other reads in the same
/// batch are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{entry_point} {kind:?}: {message}")]
pub struct CallError {
    pub entry_point: EntryPoint,
    pub kind: CallErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(entry_point: EntryPoint, kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            entry_point,
            kind,
            message: message.into(),
        }
    }

    pub fn reverted(entry_point: EntryPoint, message: impl Into<String>) -> Self {
        Self::new(entry_point, CallErrorKind::Reverted, message)
    }

    pub fn transport(entry_point: EntryPoint, message: impl Into<String>) -> Self {
        Self::new(entry_point, CallErrorKind::Transport, message)
    }

    pub fn decode(entry_point: EntryPoint, expected: &str, found: &str) -> Self {
        Self::new(
            entry_point,
            CallErrorKind::Decode,
            format!("expected {expected}, found {found}"),
        )
    }
}

/// Terminal failure of a write. Carried verbatim to the UI; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum TxFailure {
    #[error("user rejected the request: {0}")]
    UserRejected(String),
    #[error("simulation reverted: {0}")]
    SimulationReverted(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("timed out after {waited_ms}ms waiting for inclusion")]
    Timeout { waited_ms: u64 },
}

impl TxFailure {
    /// Underlying reason text as reported by the wallet or node.
    pub fn message(&self) -> String {
        match self {
            TxFailure::UserRejected(message)
            | TxFailure::SimulationReverted(message)
            | TxFailure::NetworkError(message) => message.clone(),
            TxFailure::Timeout { .. } => self.to_string(),
        }
    }
}
