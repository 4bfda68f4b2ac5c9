use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid Bundle: {0}")]
    InvalidBundle(String),
}

pub type Result<T> = std::result::Result<T, Error>;
