use thiserror::Error;
use zunder_models::BundleType;

/// Failures of the collection-to-transaction conversion.
///
/// All of these indicate a bundle whose records cannot be given a consistent identity. None of
/// them is raised for a reference that simply points outside the bundle.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Expected a collection Bundle, got {0:?}")]
    UnsupportedBundleType(BundleType),

    #[error("Entry {index}: resource has no resourceType")]
    MissingResourceType { index: usize },

    #[error("Entry {index}: no identity mapped for '{key}'")]
    MissingIdentity { index: usize, key: String },

    #[error("Entry {index}: identity {urn} was already assigned to an earlier entry")]
    DuplicateIdentity { index: usize, urn: String },

    #[error("Entry {index}: transaction entry has no resource")]
    MissingResource { index: usize },
}

pub type Result<T> = std::result::Result<T, TransformError>;
