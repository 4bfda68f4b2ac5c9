//! Collection-to-transaction Bundle conversion
//!
//! Re-identifies every record of a collection Bundle with a fresh `urn:uuid:` identity and
//! rewrites every reference between records so the resulting transaction can be submitted as
//! a set of creates without losing a single edge of the resource graph.
//!
//! The conversion runs in three steps, each usable on its own:
//!
//! 1. [`build_mapping`] assigns identities and records every textual form that denotes them.
//! 2. [`assemble`] emits one `POST` entry per record.
//! 3. [`rewrite`] points every resolvable reference at the new identity.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use zunder_bundle::to_transaction_bundle;
//! use zunder_models::Bundle;
//!
//! let collection = Bundle::from_value(&json!({
//!     "resourceType": "Bundle",
//!     "type": "collection",
//!     "entry": [
//!         { "resource": { "resourceType": "Patient", "id": "p1" } },
//!         { "resource": {
//!             "resourceType": "Observation",
//!             "id": "o1",
//!             "subject": { "reference": "Patient/p1" }
//!         } }
//!     ]
//! }))
//! .unwrap();
//!
//! let transaction = to_transaction_bundle(collection).unwrap();
//! let patient_url = transaction.entries()[0].full_url.clone().unwrap();
//! let observation = transaction.entries()[1].resource.as_ref().unwrap();
//! assert_eq!(observation["subject"]["reference"], patient_url.as_str());
//! ```

pub mod assemble;
pub mod error;
pub mod identity;
pub mod references;
pub mod rewrite;

pub use assemble::assemble;
pub use error::{Result, TransformError};
pub use identity::{build_mapping, IdentityMap, URN_UUID_PREFIX};
pub use references::{find_references, references, ReferenceField, ReferenceSlot};
pub use rewrite::rewrite;

use zunder_models::Bundle;

/// Convert a collection Bundle into a transaction Bundle of creates.
///
/// Fails without returning a partial result when the records cannot be identified
/// consistently.
pub fn to_transaction_bundle(collection: Bundle) -> Result<Bundle> {
    if !collection.is_collection() {
        return Err(TransformError::UnsupportedBundleType(collection.bundle_type));
    }

    let identities = build_mapping(&collection);
    tracing::debug!(keys = identities.len(), "Built identity mapping");

    let mut transaction = assemble(collection, &identities)?;
    tracing::debug!(entries = transaction.entry_count(), "Assembled transaction");

    let rewritten = rewrite(&mut transaction, &identities)?;
    tracing::debug!(references = rewritten, "Rewrote references");

    Ok(transaction)
}
