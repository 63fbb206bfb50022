use niawase_core::types::SlotId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("remote failure: {0}")]
    RemoteFailure(String),
    #[error("upload of {slot} failed: {message}")]
    UploadFailure { slot: SlotId, message: String },

    // Local guard rejections; these never reach the remote side.
    #[error("{0} already in progress")]
    Busy(Operation),
    #[error("cannot {action} while in {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Unauthenticated => ErrorKind::Unauthenticated,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WorkflowError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            WorkflowError::RemoteFailure(_) => ErrorKind::RemoteFailure,
            WorkflowError::UploadFailure { .. } => ErrorKind::UploadFailure,
            WorkflowError::Busy(_) => ErrorKind::Busy,
            WorkflowError::InvalidPhase { .. } | WorkflowError::Precondition(_) => {
                ErrorKind::Precondition
            }
        }
    }

    /// Whether re-issuing the same action can succeed without other changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::RemoteFailure(_)
                | WorkflowError::MalformedResponse(_)
                | WorkflowError::UploadFailure { .. }
                | WorkflowError::Busy(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Diagnosis,
    Synthesis,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Diagnosis => f.write_str("diagnosis"),
            Operation::Synthesis => f.write_str("image generation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    InvalidArgument,
    MalformedResponse,
    RemoteFailure,
    UploadFailure,
    Busy,
    Precondition,
}

/// User-visible error recorded on the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(prefix: &str, err: &WorkflowError) -> Self {
        Self {
            kind: err.kind(),
            message: format!("{prefix}: {err}"),
        }
    }
}

/// Failure of the one-time bootstrap that yields an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("sign-in failed: {0}")]
    SignIn(String),
    #[error("identity provider returned no usable principal")]
    NoPrincipal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_info_prefixes_message() {
        let info = ErrorInfo::from_error(
            "AI diagnosis failed",
            &WorkflowError::RemoteFailure("timed out".into()),
        );
        assert_eq!(info.kind, ErrorKind::RemoteFailure);
        assert_eq!(info.message, "AI diagnosis failed: remote failure: timed out");
    }

    #[test]
    fn retryability() {
        assert!(WorkflowError::RemoteFailure("x".into()).is_retryable());
        assert!(WorkflowError::Busy(Operation::Synthesis).is_retryable());
        assert!(!WorkflowError::Unauthenticated.is_retryable());
        assert!(!WorkflowError::NotFound("profile".into()).is_retryable());
    }
}
