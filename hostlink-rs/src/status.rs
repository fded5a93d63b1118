//! Outcome of a single `run` / `run_file` call.

use std::fmt;
use std::sync::Arc;

use crate::error::{BridgeError, FailureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    Failed,
}

/// Status plus, on failure, the error that caused it.
///
/// Exactly one of these is live per runtime handle; every run replaces it.
/// Cloning shares the underlying error.
#[derive(Debug, Clone)]
pub struct RunResult {
    status: RunStatus,
    message: Option<String>,
    error: Option<Arc<BridgeError>>,
}

impl RunResult {
    pub fn ok() -> Self {
        RunResult { status: RunStatus::Ok, message: None, error: None }
    }

    pub fn failed(error: BridgeError) -> Self {
        RunResult {
            status: RunStatus::Failed,
            message: Some(error.to_string()),
            error: Some(Arc::new(error)),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Human-readable failure description; `None` after a successful run.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&BridgeError> {
        self.error.as_deref()
    }

    pub fn kind(&self) -> Option<FailureKind> {
        self.error().map(BridgeError::kind)
    }
}

impl From<Result<(), BridgeError>> for RunResult {
    fn from(r: Result<(), BridgeError>) -> Self {
        match r {
            Ok(()) => RunResult::ok(),
            Err(e) => RunResult::failed(e),
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "failed: {msg}"),
            None => f.write_str("ok"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
