//! Error types for the intake pipeline

use crate::services::ReceiveStage;
use serde_json::{json, Value};
use thiserror::Error;
use zunder_bundle::TransformError;
use zunder_validator::{IssueCode, ValidationIssue};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Invalid Bundle: {0}")]
    Model(#[from] zunder_models::Error),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    /// A validator or transaction executor failed while the gate was in `stage`.
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: ReceiveStage,
        #[source]
        source: Box<Error>,
    },

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Remote server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validator configuration error: {0}")]
    ValidatorConfig(#[from] zunder_validator::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    pub(crate) fn collaborator(stage: ReceiveStage, source: Error) -> Self {
        Error::Collaborator {
            stage,
            source: Box::new(source),
        }
    }

    fn issue_code(&self) -> IssueCode {
        match self {
            Error::InvalidResource(_) | Error::Model(_) | Error::Json(_) => IssueCode::Invalid,
            Error::Transform(_) => IssueCode::Processing,
            Error::Collaborator { source, .. } => source.issue_code(),
            Error::Conflict(_) => IssueCode::Duplicate,
            Error::Remote { .. } | Error::Http(_) => IssueCode::Transient,
            Error::Config(_) | Error::ValidatorConfig(_) | Error::Internal(_) => {
                IssueCode::Exception
            }
        }
    }

    /// Render as an OperationOutcome for the calling layer.
    pub fn to_operation_outcome(&self) -> Value {
        let issue = ValidationIssue::error(self.issue_code(), self.to_string());
        json!({
            "resourceType": "OperationOutcome",
            "issue": [issue.to_json()]
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
