//! Identity mapping
//!
//! Every record of a collection Bundle receives one freshly generated `urn:uuid:` identity.
//! The [`IdentityMap`] records that identity under every textual form that can denote the
//! record inside the bundle:
//!
//! - the entry's `fullUrl`
//! - `Type/id`
//! - `/Type/id`
//! - any other reference string found in the bundle that resolves to the same entry
//!   (version-specific `Type/id/_history/n`, or an absolute URL matching the entry's own
//!   absolute `fullUrl`)

use crate::references::references;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;
use zunder_models::{Bundle, BundleEntry};

pub const URN_UUID_PREFIX: &str = "urn:uuid:";

/// Old key -> new `urn:uuid:` identity, scoped to one conversion.
///
/// The map only grows: there is no way to remove or replace a key once it is known.
/// Besides the textual keys, every record's identity is also kept under its entry index, so
/// records with neither `fullUrl` nor `id` still have one.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    mapping: HashMap<String, String>,
    records: HashMap<usize, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.mapping.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.mapping.contains_key(key)
    }

    /// Resolve a reference string: verbatim first, then without a leading `/`.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        self.get(reference).or_else(|| {
            reference
                .strip_prefix('/')
                .and_then(|relative| self.get(relative))
        })
    }

    /// Identity generated for the record of entry `index`.
    pub fn record_identity(&self, index: usize) -> Option<&str> {
        self.records.get(&index).map(String::as_str)
    }

    /// Number of textual keys.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty() && self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: String, urn: String) {
        self.mapping.insert(key, urn);
    }

    fn alias(&mut self, key: &str, urn: String) {
        if !self.mapping.contains_key(key) {
            self.mapping.insert(key.to_string(), urn);
        }
    }
}

/// Generate a new `urn:uuid:` identity.
pub fn new_urn() -> String {
    format!("{}{}", URN_UUID_PREFIX, Uuid::new_v4())
}

/// `Type/id` key of a resource, if it has both.
pub fn local_key(resource: &Value) -> Option<String> {
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    let id = resource.get("id").and_then(Value::as_str)?;
    Some(format!("{}/{}", resource_type, id))
}

/// Build the identity map for a collection Bundle.
///
/// Entries without a resource contribute nothing.
pub fn build_mapping(bundle: &Bundle) -> IdentityMap {
    let mut identities = IdentityMap::new();

    // Primary keys: one identity per record, shared by all of its keys.
    for (index, entry) in bundle.entries().iter().enumerate() {
        let Some(resource) = record(entry) else {
            continue;
        };

        let urn = new_urn();
        identities.records.insert(index, urn.clone());
        if let Some(full_url) = &entry.full_url {
            identities.insert(full_url.clone(), urn.clone());
        }
        if let Some(key) = local_key(resource) {
            identities.insert(format!("/{}", key), urn.clone());
            identities.insert(key, urn);
        }
    }

    // Secondary keys: reference strings that denote a record in the bundle without being
    // one of its primary keys.
    let targets: Vec<Target<'_>> = bundle
        .entries()
        .iter()
        .filter_map(|entry| {
            let resource = record(entry)?;
            Some(Target {
                full_url: entry.full_url.as_deref(),
                local_key: local_key(resource),
            })
        })
        .collect();

    for entry in bundle.entries() {
        let Some(resource) = record(entry) else {
            continue;
        };

        for field in references(resource) {
            if identities.contains_key(field.value) {
                continue;
            }
            let Some(target) = targets.iter().find(|t| t.denoted_by(field.value)) else {
                continue;
            };
            let urn = target
                .local_key
                .as_deref()
                .and_then(|key| identities.get(key))
                .or_else(|| target.full_url.and_then(|url| identities.get(url)))
                .map(str::to_owned);
            if let Some(urn) = urn {
                identities.alias(field.value, urn);
            }
        }
    }

    identities
}

/// Resource of an entry, treating JSON `null` like an absent resource.
pub(crate) fn record(entry: &BundleEntry) -> Option<&Value> {
    entry.resource.as_ref().filter(|r| !r.is_null())
}

struct Target<'a> {
    full_url: Option<&'a str>,
    local_key: Option<String>,
}

impl Target<'_> {
    fn denoted_by(&self, reference: &str) -> bool {
        let versionless = strip_history(reference);

        if let Some(key) = &self.local_key {
            let relative = versionless.strip_prefix('/').unwrap_or(versionless);
            if relative == key {
                return true;
            }
        }

        // Absolute references only ever match the entry's own absolute fullUrl; a
        // `http://elsewhere/Patient/1` must not be taken for the local `Patient/1`.
        match self.full_url {
            Some(full_url) if is_absolute_url(full_url) => versionless == full_url,
            _ => false,
        }
    }
}

// "Patient/1/_history/2" -> "Patient/1"
fn strip_history(reference: &str) -> &str {
    match reference.find("/_history/") {
        Some(idx) => &reference[..idx],
        None => reference,
    }
}

fn is_absolute_url(value: &str) -> bool {
    value.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(value: Value) -> Bundle {
        Bundle::from_value(&value).unwrap()
    }

    #[test]
    fn all_primary_keys_share_one_identity() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{
                "fullUrl": "urn:uuid:a",
                "resource": { "resourceType": "Patient", "id": "p1" }
            }]
        }));

        let identities = build_mapping(&b);
        let urn = identities.get("urn:uuid:a").unwrap();
        assert!(urn.starts_with(URN_UUID_PREFIX));
        assert_eq!(identities.get("Patient/p1"), Some(urn));
        assert_eq!(identities.get("/Patient/p1"), Some(urn));
        assert_eq!(identities.len(), 3);
    }

    #[test]
    fn records_get_distinct_identities() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "p1" } },
                { "resource": { "resourceType": "Patient", "id": "p2" } }
            ]
        }));

        let identities = build_mapping(&b);
        assert_ne!(identities.get("Patient/p1"), identities.get("Patient/p2"));
    }

    #[test]
    fn empty_entries_contribute_nothing() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "fullUrl": "urn:uuid:empty" },
                { "fullUrl": "urn:uuid:null", "resource": null }
            ]
        }));

        assert!(build_mapping(&b).is_empty());
    }

    #[test]
    fn record_without_id_is_keyed_by_full_url_only() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{
                "fullUrl": "urn:uuid:anon",
                "resource": { "resourceType": "Patient" }
            }]
        }));

        let identities = build_mapping(&b);
        assert_eq!(identities.len(), 1);
        assert!(identities.contains_key("urn:uuid:anon"));
        assert_eq!(identities.record_identity(0), identities.get("urn:uuid:anon"));
    }

    #[test]
    fn record_without_any_key_still_has_an_identity() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "resource": null },
                { "resource": { "resourceType": "Observation" } }
            ]
        }));

        let identities = build_mapping(&b);
        assert_eq!(identities.len(), 0);
        assert!(!identities.is_empty());
        assert!(identities.record_identity(0).is_none());
        assert!(identities
            .record_identity(1)
            .is_some_and(|urn| urn.starts_with(URN_UUID_PREFIX)));
    }

    #[test]
    fn version_specific_references_are_aliased() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "p1" } },
                { "resource": {
                    "resourceType": "Observation",
                    "id": "o1",
                    "subject": { "reference": "Patient/p1/_history/3" },
                    "focus": [{ "reference": "/Patient/p1/_history/1" }]
                } }
            ]
        }));

        let identities = build_mapping(&b);
        let urn = identities.get("Patient/p1").unwrap();
        assert_eq!(identities.get("Patient/p1/_history/3"), Some(urn));
        assert_eq!(identities.get("/Patient/p1/_history/1"), Some(urn));
    }

    #[test]
    fn absolute_references_only_match_own_full_url() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {
                    "fullUrl": "http://example.org/fhir/Patient/p1",
                    "resource": { "resourceType": "Patient", "id": "p1" }
                },
                { "resource": {
                    "resourceType": "Observation",
                    "id": "o1",
                    "subject": { "reference": "http://example.org/fhir/Patient/p1/_history/2" },
                    "performer": [{ "reference": "http://elsewhere.org/fhir/Patient/p1" }]
                } }
            ]
        }));

        let identities = build_mapping(&b);
        let urn = identities.get("Patient/p1").unwrap();
        assert_eq!(
            identities.get("http://example.org/fhir/Patient/p1/_history/2"),
            Some(urn)
        );
        assert!(!identities.contains_key("http://elsewhere.org/fhir/Patient/p1"));
    }

    #[test]
    fn unresolvable_references_stay_unmapped() {
        let b = bundle(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{ "resource": {
                "resourceType": "Observation",
                "id": "o1",
                "subject": { "reference": "Organization/missing" }
            } }]
        }));

        let identities = build_mapping(&b);
        assert!(!identities.contains_key("Organization/missing"));
        assert_eq!(identities.len(), 2);
    }

    #[test]
    fn resolve_strips_leading_separator() {
        let mut identities = IdentityMap::new();
        identities.insert("Patient/p1".to_string(), "urn:uuid:x".to_string());
        assert_eq!(identities.resolve("/Patient/p1"), Some("urn:uuid:x"));
        assert_eq!(identities.resolve("Patient/p1"), Some("urn:uuid:x"));
        assert_eq!(identities.resolve("//Patient/p1"), None);
    }

    #[test]
    fn strip_history_handles_plain_references() {
        assert_eq!(strip_history("Patient/1"), "Patient/1");
        assert_eq!(strip_history("Patient/1/_history/7"), "Patient/1");
    }
}
