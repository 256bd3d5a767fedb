use thiserror::Error;
use uuid::Uuid;

pub type CadenceResult<T> = Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Contact already has an open enrollment ({enrollment_id}, status {status})")]
    DuplicateEnrollment { enrollment_id: Uuid, status: String },

    #[error("{0}")]
    ConcurrentModification(String),

    #[error("{0}")]
    SequenceInUse(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CadenceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }

    /// Stable machine-readable reason code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::DuplicateEnrollment { .. } => "duplicate_enrollment",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::SequenceInUse(_) => "sequence_in_use",
            Self::Repository(_) => "repository_error",
            Self::Collaborator(_) => "collaborator_failure",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the API layer maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidTransition(_) | Self::SequenceInUse(_) => 400,
            Self::NotFound(_) => 404,
            Self::DuplicateEnrollment { .. } | Self::ConcurrentModification(_) => 409,
            // Collaborator failures are degraded in place; reaching the API
            // boundary means a caller chose to surface one.
            Self::Collaborator(_) => 502,
            Self::Config(_) | Self::Repository(_) | Self::Serialization(_) | Self::Internal(_) => {
                500
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let dup = CadenceError::DuplicateEnrollment {
            enrollment_id: Uuid::nil(),
            status: "active".into(),
        };
        assert_eq!(dup.code(), "duplicate_enrollment");
        assert_eq!(dup.http_status(), 409);
        assert_eq!(
            dup.to_string(),
            format!(
                "Contact already has an open enrollment ({}, status active)",
                Uuid::nil()
            )
        );

        let nf = CadenceError::not_found("Sequence", "abc");
        assert_eq!(nf.to_string(), "Sequence abc not found");
        assert_eq!(nf.http_status(), 404);

        assert_eq!(CadenceError::Validation("x".into()).http_status(), 400);
        assert_eq!(CadenceError::Repository("x".into()).code(), "repository_error");
    }
}
