//! FHIR Bundle model
//!
//! Only the envelope is typed. Entry resources are kept as raw JSON so any resource kind
//! passes through untouched, and unknown Bundle/entry members survive a round-trip via the
//! flattened `extensions` maps.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FHIR Bundle resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Resource type - always "Bundle"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Indicates the purpose of this bundle
    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Vec<BundleEntry>>,

    /// Additional content beyond core fields (link, signature, version-specific fields)
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "Bundle".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    TransactionResponse,
    Batch,
    BatchResponse,
    History,
    Searchset,
    Collection,
}

/// Entry in the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Identity of the entry within the bundle (absolute URL or `urn:uuid:...`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// What to do with the entry when the bundle is a transaction or batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,

    /// Results of execution (transaction/batch responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleEntryResponse>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntryRequest {
    /// HTTP verb for the entry (GET | POST | PUT | PATCH | DELETE)
    pub method: String,

    /// URL for HTTP equivalent of this entry
    pub url: String,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntryResponse {
    /// Status response code (e.g. "201 Created")
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// OperationOutcome with hints and warnings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl Bundle {
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: None,
            bundle_type,
            timestamp: None,
            entry: None,
            extensions: HashMap::new(),
        }
    }

    /// Parse from JSON Value, rejecting anything that is not a Bundle.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => {}
            Some(other) => {
                return Err(Error::InvalidBundle(format!(
                    "expected resourceType 'Bundle', found '{}'",
                    other
                )))
            }
            None => {
                return Err(Error::InvalidBundle(
                    "missing resourceType".to_string(),
                ))
            }
        }
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.bundle_type, BundleType::Collection)
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self.bundle_type, BundleType::Transaction)
    }

    pub fn entry_count(&self) -> usize {
        self.entry.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    pub fn entries(&self) -> &[BundleEntry] {
        self.entry.as_deref().unwrap_or(&[])
    }

    pub fn entries_mut(&mut self) -> &mut [BundleEntry] {
        self.entry.as_deref_mut().unwrap_or(&mut [])
    }

    /// Consume the bundle, yielding its entries in order.
    pub fn into_entries(self) -> Vec<BundleEntry> {
        self.entry.unwrap_or_default()
    }

    pub fn add_entry(&mut self, entry: BundleEntry) {
        self.entry.get_or_insert_with(Vec::new).push(entry);
    }
}

impl BundleEntry {
    pub fn new(resource: Option<Value>) -> Self {
        Self {
            full_url: None,
            resource,
            request: None,
            response: None,
            extensions: HashMap::new(),
        }
    }

    pub fn with_full_url(mut self, full_url: impl Into<String>) -> Self {
        self.full_url = Some(full_url.into());
        self
    }

    pub fn with_request(mut self, request: BundleEntryRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// `resourceType` of the entry's resource, if any.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
    }

    /// Logical `id` of the entry's resource, if any.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
    }
}

impl BundleEntryRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            extensions: HashMap::new(),
        }
    }
}

impl BundleEntryResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            location: None,
            etag: None,
            last_modified: None,
            outcome: None,
            extensions: HashMap::new(),
        }
    }
}
