//! FHIR data models
//!
//! Version-agnostic structures for the resources the intake pipeline moves around.
//! Resources themselves stay `serde_json::Value`; only the Bundle envelope is typed.
//!
//! # Example
//!
//! ```rust
//! use zunder_models::{Bundle, BundleType};
//! use serde_json::json;
//!
//! let bundle = Bundle::from_value(&json!({
//!     "resourceType": "Bundle",
//!     "type": "collection",
//!     "entry": [{ "resource": { "resourceType": "Patient", "id": "p1" } }]
//! }))
//! .unwrap();
//!
//! assert_eq!(bundle.bundle_type, BundleType::Collection);
//! assert_eq!(bundle.entries()[0].resource_type(), Some("Patient"));
//! ```

mod bundle;
mod error;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse, BundleType};
pub use error::{Error, Result};
