//! Transaction executors
//!
//! The intake gate hands a fully re-identified transaction Bundle to a [`TransactionExecutor`]
//! and expects a `transaction-response` Bundle back. Two executors are provided:
//! [`InMemoryTransactionExecutor`] commits into a process-local store and
//! [`RemoteTransactionExecutor`] POSTs the Bundle to a FHIR server base URL.

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;
use zunder_models::{Bundle, BundleEntry, BundleEntryResponse, BundleType};

const FHIR_JSON: &str = "application/fhir+json";

#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Execute a transaction Bundle, returning the transaction-response Bundle.
    async fn execute_transaction(&self, bundle: Bundle) -> Result<Bundle>;
}

/// Commits POST-only transactions into an in-process store keyed by `Kind/id`.
///
/// Either every entry is stored or none is.
#[derive(Debug, Default)]
pub struct InMemoryTransactionExecutor {
    store: RwLock<HashMap<String, Value>>,
}

impl InMemoryTransactionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, resource_type: &str, id: &str) -> Option<Value> {
        let store = self.store.read().await;
        store.get(&format!("{}/{}", resource_type, id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

struct PreparedEntry {
    key: String,
    full_url: Option<String>,
    resource: Value,
}

#[async_trait]
impl TransactionExecutor for InMemoryTransactionExecutor {
    async fn execute_transaction(&self, bundle: Bundle) -> Result<Bundle> {
        if !bundle.is_transaction() {
            return Err(Error::InvalidResource(format!(
                "Expected a transaction Bundle, got {:?}",
                bundle.bundle_type
            )));
        }

        let mut prepared = prepare_entries(bundle.into_entries())?;

        // fullUrl → Kind/id, used to turn placeholder references into stored identities.
        let identities: HashMap<String, String> = prepared
            .iter()
            .filter_map(|p| p.full_url.clone().map(|url| (url, p.key.clone())))
            .collect();

        let now = Utc::now();
        for entry in &mut prepared {
            for mut slot in zunder_bundle::find_references(&mut entry.resource) {
                if let Some(key) = identities.get(slot.get()) {
                    slot.set(key.clone());
                }
            }
            populate_meta(&mut entry.resource, 1, now);
        }

        let mut store = self.store.write().await;
        if let Some(existing) = prepared.iter().find(|p| store.contains_key(&p.key)) {
            return Err(Error::Conflict(format!(
                "Resource {} already exists",
                existing.key
            )));
        }

        let last_modified = now.to_rfc3339();
        let mut response_entries = Vec::with_capacity(prepared.len());
        for entry in prepared {
            let mut response = BundleEntryResponse::new("201 Created");
            response.location = Some(format!("{}/_history/1", entry.key));
            response.etag = Some("W/\"1\"".to_string());
            response.last_modified = Some(last_modified.clone());

            let mut response_entry = BundleEntry::new(Some(entry.resource.clone()));
            response_entry.full_url = entry.full_url;
            response_entry.response = Some(response);
            response_entries.push(response_entry);

            store.insert(entry.key, entry.resource);
        }
        drop(store);

        tracing::debug!(
            entries = response_entries.len(),
            "In-memory transaction committed"
        );

        let mut response = Bundle::new(BundleType::TransactionResponse);
        response.id = Some(Uuid::new_v4().to_string());
        response.timestamp = Some(last_modified);
        response.entry = Some(response_entries);
        Ok(response)
    }
}

fn prepare_entries(entries: Vec<BundleEntry>) -> Result<Vec<PreparedEntry>> {
    let mut seen_full_urls = HashSet::new();
    let mut seen_keys = HashSet::new();
    let mut prepared = Vec::with_capacity(entries.len());

    for (i, entry) in entries.into_iter().enumerate() {
        let BundleEntry {
            full_url,
            resource,
            request,
            ..
        } = entry;

        let request = request.ok_or_else(|| {
            Error::InvalidResource(format!("Transaction entry {} missing request", i))
        })?;
        let method = request.method.to_uppercase();
        if method != "POST" {
            return Err(Error::InvalidResource(format!(
                "Transaction entry {} uses unsupported method {}",
                i, method
            )));
        }

        let resource = resource.filter(|r| !r.is_null()).ok_or_else(|| {
            Error::InvalidResource(format!(
                "Transaction entry {} with method POST missing resource",
                i
            ))
        })?;
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "Transaction entry {} resource has no resourceType",
                    i
                ))
            })?;
        if request.url != resource_type {
            return Err(Error::InvalidResource(format!(
                "Transaction entry {} posts {} to '{}'",
                i, resource_type, request.url
            )));
        }
        let id = resource.get("id").and_then(Value::as_str).ok_or_else(|| {
            Error::InvalidResource(format!("Transaction entry {} resource has no id", i))
        })?;
        let key = format!("{}/{}", resource_type, id);

        if let Some(full_url) = &full_url {
            if !seen_full_urls.insert(full_url.clone()) {
                return Err(Error::InvalidResource(format!(
                    "Duplicate fullUrl in transaction at entry {}: {}",
                    i, full_url
                )));
            }
        }
        if !seen_keys.insert(key.clone()) {
            return Err(Error::Conflict(format!(
                "Resource {} is created twice in one transaction",
                key
            )));
        }

        prepared.push(PreparedEntry {
            key,
            full_url,
            resource,
        });
    }

    Ok(prepared)
}

fn populate_meta(resource: &mut Value, version_id: i32, now: chrono::DateTime<Utc>) {
    if let Some(obj) = resource.as_object_mut() {
        let meta = obj.entry("meta".to_string()).or_insert_with(|| json!({}));
        if let Some(meta_obj) = meta.as_object_mut() {
            meta_obj.insert("versionId".to_string(), json!(version_id.to_string()));
            meta_obj.insert("lastUpdated".to_string(), json!(now.to_rfc3339()));
        }
    }
}

/// POSTs the transaction to a FHIR server's base URL.
pub struct RemoteTransactionExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteTransactionExecutor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TransactionExecutor for RemoteTransactionExecutor {
    async fn execute_transaction(&self, bundle: Bundle) -> Result<Bundle> {
        let body = serde_json::to_vec(&bundle)?;

        tracing::debug!(
            url = %self.base_url,
            entries = bundle.entry_count(),
            "Posting transaction"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: remote_message(&text),
            });
        }

        let value: Value = serde_json::from_str(&text)?;
        Ok(Bundle::from_value(&value)?)
    }
}

/// Pull the diagnostics out of an OperationOutcome body, falling back to the raw text.
fn remote_message(body: &str) -> String {
    let diagnostics = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let issues = v.get("issue")?.as_array()?;
        let messages: Vec<&str> = issues
            .iter()
            .filter_map(|issue| {
                issue
                    .get("diagnostics")
                    .and_then(Value::as_str)
                    .or_else(|| issue.pointer("/details/text").and_then(Value::as_str))
            })
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    });

    diagnostics.unwrap_or_else(|| body.trim().to_string())
}
