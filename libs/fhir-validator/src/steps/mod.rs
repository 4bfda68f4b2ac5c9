pub mod bundles;
pub mod references;
pub mod schema;

use serde_json::Value;

pub(crate) const URN_UUID_PREFIX: &str = "urn:uuid:";
pub(crate) const URN_OID_PREFIX: &str = "urn:oid:";

pub(crate) fn get_resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

/// Canonical 8-4-4-4-12 hex form.
pub(crate) fn is_uuid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

pub(crate) fn is_oid(value: &str) -> bool {
    !value.is_empty()
        && value
            .split('.')
            .all(|arc| !arc.is_empty() && arc.chars().all(|c| c.is_ascii_digit()))
}
