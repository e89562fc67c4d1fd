use thiserror::Error;

use crate::backend::BackendError;

/// Everything that can go wrong on the client side of a sensitive action.
///
/// All variants are caught at the guard/action boundary and converted into a
/// single notification; none escape to the caller of the event loop.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("Please set your GPG email and secret question first")]
    PrerequisiteMissing,
    #[error("Another confirmation is already in progress")]
    GateBusy,
    #[error("Invalid answer, please try again")]
    ChallengeRejected,
    #[error("{0}")]
    Operation(String),
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        Self::Operation(err.to_string())
    }
}
