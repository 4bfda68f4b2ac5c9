//! Bundle-level checks
//!
//! Only applies when the validated resource is a Bundle. Covers the properties the intake
//! pipeline relies on to give every entry a consistent identity.

use super::{get_resource_type, is_uuid, URN_UUID_PREFIX};
use crate::validator::{IssueCode, ValidationIssue};
use crate::BundlePlan;
use serde_json::Value;
use std::collections::HashMap;
use zunder_models::BundleType;

pub fn validate_bundle(bundle: &Value, plan: &BundlePlan, issues: &mut Vec<ValidationIssue>) {
    if get_resource_type(bundle) != Some("Bundle") {
        return;
    }

    validate_type(bundle, plan, issues);

    let entries = match bundle.get("entry") {
        None | Some(Value::Null) => return,
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            issues.push(
                ValidationIssue::error(
                    IssueCode::Structure,
                    "'entry' must be an array".to_string(),
                )
                .with_location("Bundle.entry".to_string()),
            );
            return;
        }
    };

    let mut full_urls: HashMap<&str, usize> = HashMap::new();
    let mut local_keys: HashMap<String, usize> = HashMap::new();

    for (idx, entry) in entries.iter().enumerate() {
        let path = format!("Bundle.entry[{}]", idx);
        let full_url = entry.get("fullUrl").and_then(Value::as_str);

        let Some(resource) = entry.get("resource").filter(|r| !r.is_null()) else {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::Incomplete,
                    "Entry has no resource and will be ignored".to_string(),
                )
                .with_location(path),
            );
            continue;
        };

        if let Some(full_url) = full_url {
            if let Some(uuid) = full_url.strip_prefix(URN_UUID_PREFIX) {
                if !is_uuid(uuid) {
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::Value,
                            format!("fullUrl '{}' is not a valid urn:uuid", full_url),
                        )
                        .with_location(format!("{}.fullUrl", path)),
                    );
                }
            }
            if let Some(first) = full_urls.insert(full_url, idx) {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::Duplicate,
                        format!(
                            "fullUrl '{}' is already used by Bundle.entry[{}]",
                            full_url, first
                        ),
                    )
                    .with_location(format!("{}.fullUrl", path)),
                );
            }
        }

        let id = resource.get("id").and_then(Value::as_str);
        match (get_resource_type(resource), id) {
            (Some(rt), Some(id)) => {
                let key = format!("{}/{}", rt, id);
                if let Some(first) = local_keys.get(&key) {
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::Duplicate,
                            format!(
                                "Resource '{}' is already present in Bundle.entry[{}]",
                                key, first
                            ),
                        )
                        .with_location(format!("{}.resource.id", path)),
                    );
                } else {
                    local_keys.insert(key, idx);
                }
            }
            (_, None) if full_url.is_none() => {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::Required,
                        "Entry cannot be identified: it has neither fullUrl nor resource.id"
                            .to_string(),
                    )
                    .with_location(path),
                );
            }
            _ => {}
        }
    }
}

fn validate_type(bundle: &Value, plan: &BundlePlan, issues: &mut Vec<ValidationIssue>) {
    let Some(raw) = bundle.get("type") else {
        issues.push(
            ValidationIssue::error(IssueCode::Required, "Bundle must have a 'type'".to_string())
                .with_location("Bundle.type".to_string()),
        );
        return;
    };

    let bundle_type: BundleType = match serde_json::from_value(raw.clone()) {
        Ok(t) => t,
        Err(_) => {
            issues.push(
                ValidationIssue::error(IssueCode::Value, format!("Unknown Bundle type {}", raw))
                    .with_location("Bundle.type".to_string()),
            );
            return;
        }
    };

    if let Some(expected) = plan.expected_type {
        if bundle_type != expected {
            issues.push(
                ValidationIssue::error(
                    IssueCode::Value,
                    format!(
                        "Bundle type {} is not accepted here; expected {}",
                        raw,
                        type_name(expected)
                    ),
                )
                .with_location("Bundle.type".to_string()),
            );
        }
    }
}

fn type_name(bundle_type: BundleType) -> String {
    serde_json::to_value(bundle_type)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| format!("{:?}", bundle_type))
}
