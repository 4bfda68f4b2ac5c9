//! Transaction assembly
//!
//! Turns every record of a collection Bundle into a `POST` entry carrying its new identity.

use crate::error::{Result, TransformError};
use crate::identity::{local_key, record, IdentityMap, URN_UUID_PREFIX};
use serde_json::Value;
use std::collections::HashSet;
use zunder_models::{Bundle, BundleEntry, BundleEntryRequest, BundleType};

const CREATE_METHOD: &str = "POST";

/// Build the transaction Bundle for `collection` using the identities in `identities`.
///
/// Entries without a resource are dropped; all others keep their relative order. References
/// inside the records are not touched here, see [`crate::rewrite`].
pub fn assemble(collection: Bundle, identities: &IdentityMap) -> Result<Bundle> {
    let mut transaction = Bundle::new(BundleType::Transaction);
    let mut assigned: HashSet<String> = HashSet::new();

    for (index, entry) in collection.into_entries().into_iter().enumerate() {
        if record(&entry).is_none() {
            continue;
        }
        let BundleEntry {
            full_url,
            resource: Some(mut resource),
            ..
        } = entry
        else {
            continue;
        };

        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(TransformError::MissingResourceType { index })?;

        let urn = resolve_identity(index, full_url.as_deref(), &resource, identities)?;
        if !assigned.insert(urn.clone()) {
            return Err(TransformError::DuplicateIdentity { index, urn });
        }

        let new_id = urn.strip_prefix(URN_UUID_PREFIX).unwrap_or(&urn).to_string();
        if let Some(obj) = resource.as_object_mut() {
            obj.insert("id".to_string(), Value::String(new_id));
        }

        transaction.add_entry(
            BundleEntry::new(Some(resource))
                .with_full_url(urn)
                .with_request(BundleEntryRequest::new(CREATE_METHOD, resource_type)),
        );
    }

    // Always emit an entry array, even for an empty transaction.
    transaction.entry.get_or_insert_with(Vec::new);
    Ok(transaction)
}

/// Declared `fullUrl` first, then `Type/id`, then the identity kept for the entry itself.
fn resolve_identity(
    index: usize,
    full_url: Option<&str>,
    resource: &Value,
    identities: &IdentityMap,
) -> Result<String> {
    if let Some(urn) = full_url.and_then(|url| identities.get(url)) {
        return Ok(urn.to_string());
    }

    let key = local_key(resource);
    if let Some(urn) = key.as_deref().and_then(|k| identities.get(k)) {
        return Ok(urn.to_string());
    }

    if let Some(urn) = identities.record_identity(index) {
        return Ok(urn.to_string());
    }

    Err(TransformError::MissingIdentity {
        index,
        key: key
            .or_else(|| full_url.map(str::to_owned))
            .unwrap_or_else(|| "<no fullUrl or id>".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::build_mapping;
    use serde_json::json;

    fn collection(entries: Value) -> Bundle {
        Bundle::from_value(&json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": entries
        }))
        .unwrap()
    }

    #[test]
    fn emits_post_entries_with_new_identity() {
        let input = collection(json!([
            { "fullUrl": "urn:uuid:a", "resource": { "resourceType": "Patient", "id": "p1" } }
        ]));
        let identities = build_mapping(&input);
        let urn = identities.get("urn:uuid:a").unwrap().to_string();

        let tx = assemble(input, &identities).unwrap();
        assert!(tx.is_transaction());
        assert_eq!(tx.entry_count(), 1);

        let entry = &tx.entries()[0];
        assert_eq!(entry.full_url.as_deref(), Some(urn.as_str()));
        let request = entry.request.as_ref().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "Patient");
        assert_eq!(
            entry.resource_id(),
            urn.strip_prefix(URN_UUID_PREFIX)
        );
    }

    #[test]
    fn falls_back_to_type_and_id() {
        let input = collection(json!([
            { "resource": { "resourceType": "Patient", "id": "p1" } }
        ]));
        let identities = build_mapping(&input);
        let urn = identities.get("Patient/p1").unwrap().to_string();

        let tx = assemble(input, &identities).unwrap();
        assert_eq!(tx.entries()[0].full_url.as_deref(), Some(urn.as_str()));
    }

    #[test]
    fn drops_entries_without_resource() {
        let input = collection(json!([
            { "fullUrl": "urn:uuid:gone" },
            { "resource": { "resourceType": "Patient", "id": "p1" } },
            { "resource": null }
        ]));
        let identities = build_mapping(&input);

        let tx = assemble(input, &identities).unwrap();
        assert_eq!(tx.entry_count(), 1);
    }

    #[test]
    fn unmapped_record_is_a_consistency_failure() {
        let input = collection(json!([
            { "resource": { "resourceType": "Patient", "id": "p1" } }
        ]));

        let err = assemble(input, &IdentityMap::new()).unwrap_err();
        assert!(matches!(
            err,
            TransformError::MissingIdentity { index: 0, ref key } if key == "Patient/p1"
        ));
    }

    #[test]
    fn record_without_any_key_uses_its_entry_identity() {
        let input = collection(json!([{ "resource": { "resourceType": "Patient" } }]));
        let identities = build_mapping(&input);
        let urn = identities.record_identity(0).unwrap().to_string();

        let tx = assemble(input, &identities).unwrap();
        assert_eq!(tx.entries()[0].full_url.as_deref(), Some(urn.as_str()));
        assert_eq!(tx.entries()[0].resource_id(), urn.strip_prefix(URN_UUID_PREFIX));
    }

    #[test]
    fn colliding_local_ids_are_rejected() {
        let input = collection(json!([
            { "resource": { "resourceType": "Patient", "id": "p1" } },
            { "resource": { "resourceType": "Patient", "id": "p1" } }
        ]));
        let identities = build_mapping(&input);

        let err = assemble(input, &identities).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateIdentity { index: 1, .. }));
    }

    #[test]
    fn resource_without_type_is_rejected() {
        let input = collection(json!([{ "fullUrl": "urn:uuid:x", "resource": { "id": "p1" } }]));
        let identities = build_mapping(&input);

        let err = assemble(input, &identities).unwrap_err();
        assert!(matches!(err, TransformError::MissingResourceType { index: 0 }));
    }
}
