use crate::models::ConversationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ConversationStatus,
        to: ConversationStatus,
    },
}

/// Validates if a lifecycle transition is allowed. The store's conditional
/// updates remain the authority under concurrency; this gives callers a
/// precise error before they attempt one.
pub fn validate_transition(
    from: ConversationStatus,
    to: ConversationStatus,
) -> Result<(), TransitionError> {
    use ConversationStatus::*;

    match (from, to) {
        // Same state is always valid (no-op)
        (a, b) if a == b => Ok(()),

        // First visitor message queues the conversation
        (Draft, Waiting) => Ok(()),

        // An admin claim; Draft->Active covers claiming before the first message
        (Draft, Active) => Ok(()),
        (Waiting, Active) => Ok(()),

        // Owner closes; reassignment reopens
        (Active, Closed) => Ok(()),
        (Closed, Active) => Ok(()),

        // All other transitions are invalid
        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}
