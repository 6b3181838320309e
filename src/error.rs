use thiserror::Error;

/// Error taxonomy for the chat engine.
///
/// `Conflict` is the expected outcome of losing an assignment race and is
/// surfaced to callers without being logged as an error. `Store` wraps
/// backend failures (including lock-wait timeouts) and is safe to retry:
/// every mutating operation re-validates against live state, so a repeated
/// call either succeeds or fails its precondition cleanly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conversation already taken{}", .owner.as_deref().map(|o| format!(" by {}", o)).unwrap_or_default())]
    Conflict { owner: Option<String> },

    #[error("access denied{}", .owner.as_deref().map(|o| format!(": conversation is owned by {}", o)).unwrap_or_default())]
    AccessDenied { owner: Option<String> },

    #[error("operation requires conversation ownership")]
    Unauthorized,

    #[error("transfer target does not have agent capability")]
    InvalidTarget,

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl EngineError {
    /// Whether a caller may safely retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
