//! Reference checks
//!
//! `TypeOnly` checks the textual form of every `reference` string. `Existence` additionally
//! resolves fragments against contained resources and, inside a Bundle, resolves every other
//! reference against the Bundle's entries.

use super::{get_resource_type, is_oid, is_uuid, URN_OID_PREFIX, URN_UUID_PREFIX};
use crate::validator::{IssueCode, ValidationIssue};
use crate::{ReferenceMode, ReferencesPlan};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use zunder_bundle::references;

/// What a Bundle's entries can be referred to by.
#[derive(Debug, Default)]
pub struct BundleIndex {
    full_urls: HashSet<String>,
    local_keys: HashSet<String>,
}

impl BundleIndex {
    pub fn from_bundle(bundle: &Value) -> Self {
        let mut index = Self::default();
        let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
            return index;
        };

        for entry in entries {
            let Some(resource) = entry.get("resource").filter(|r| !r.is_null()) else {
                continue;
            };
            if let Some(full_url) = entry.get("fullUrl").and_then(Value::as_str) {
                index.full_urls.insert(full_url.to_string());
            }
            if let (Some(rt), Some(id)) = (
                get_resource_type(resource),
                resource.get("id").and_then(Value::as_str),
            ) {
                index.local_keys.insert(format!("{}/{}", rt, id));
            }
        }

        index
    }

    fn contains_full_url(&self, url: &str) -> bool {
        self.full_urls.contains(url) || self.full_urls.contains(strip_history(url))
    }

    fn contains_local_key(&self, key: &str) -> bool {
        self.local_keys.contains(key)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReferenceShape<'a> {
    /// `#id`, or `#` for the container itself
    Fragment(&'a str),
    Urn,
    Absolute,
    /// `Kind/id`, normalised without leading `/` and version
    Relative(String),
    Invalid,
}

fn classify<'a>(reference: &'a str, id_pattern: &Regex) -> ReferenceShape<'a> {
    if let Some(fragment) = reference.strip_prefix('#') {
        return ReferenceShape::Fragment(fragment);
    }
    if let Some(uuid) = reference.strip_prefix(URN_UUID_PREFIX) {
        return if is_uuid(uuid) {
            ReferenceShape::Urn
        } else {
            ReferenceShape::Invalid
        };
    }
    if let Some(oid) = reference.strip_prefix(URN_OID_PREFIX) {
        return if is_oid(oid) {
            ReferenceShape::Urn
        } else {
            ReferenceShape::Invalid
        };
    }
    if reference.contains("://") {
        return ReferenceShape::Absolute;
    }

    let relative = reference.strip_prefix('/').unwrap_or(reference);
    let segments: Vec<&str> = relative.split('/').collect();
    let well_formed = match segments.as_slice() {
        [kind, id] => is_kind(kind) && id_pattern.is_match(id),
        [kind, id, "_history", version] => {
            is_kind(kind) && id_pattern.is_match(id) && id_pattern.is_match(version)
        }
        _ => false,
    };
    if well_formed {
        ReferenceShape::Relative(format!("{}/{}", segments[0], segments[1]))
    } else {
        ReferenceShape::Invalid
    }
}

fn is_kind(value: &str) -> bool {
    value.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && value.chars().all(|c| c.is_ascii_alphanumeric())
}

fn strip_history(reference: &str) -> &str {
    match reference.find("/_history/") {
        Some(idx) => &reference[..idx],
        None => reference,
    }
}

/// Validates every reference of one resource. `bundle` is set when the resource is a Bundle
/// entry, enabling resolution against the other entries.
pub fn validate_references(
    resource: &Value,
    path: &str,
    plan: &ReferencesPlan,
    bundle: Option<&BundleIndex>,
    issues: &mut Vec<ValidationIssue>,
) {
    let contained_ids: HashSet<&str> = resource
        .get("contained")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("id").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    for field in references(resource) {
        let location = format!("{}.{}", path, field.path);
        let shape = classify(field.value, &plan.id_pattern);

        if shape == ReferenceShape::Invalid {
            issues.push(
                ValidationIssue::error(
                    IssueCode::Value,
                    format!("Invalid reference format '{}'", field.value),
                )
                .with_location(location.clone())
                .with_expression(vec![location]),
            );
            continue;
        }

        if plan.mode != ReferenceMode::Existence {
            continue;
        }

        let resolved = match &shape {
            ReferenceShape::Fragment(id) => {
                if id.is_empty() || contained_ids.contains(id) {
                    continue;
                }
                issues.push(
                    ValidationIssue::error(
                        IssueCode::NotFound,
                        format!(
                            "Fragment reference '{}' does not match any contained resource",
                            field.value
                        ),
                    )
                    .with_location(location),
                );
                continue;
            }
            ReferenceShape::Urn => match bundle {
                Some(index) if !index.contains_full_url(field.value) => {
                    // A URN can never resolve outside the Bundle that declares it.
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::NotFound,
                            format!(
                                "Reference '{}' does not match any entry fullUrl",
                                field.value
                            ),
                        )
                        .with_location(location),
                    );
                    continue;
                }
                _ => continue,
            },
            ReferenceShape::Absolute => bundle.map(|index| index.contains_full_url(field.value)),
            ReferenceShape::Relative(key) => bundle.map(|index| index.contains_local_key(key)),
            ReferenceShape::Invalid => continue,
        };

        if resolved == Some(false) {
            let diagnostics = format!(
                "Reference '{}' does not resolve to an entry in the Bundle",
                field.value
            );
            let issue = if plan.allow_external {
                ValidationIssue::information(IssueCode::NotFound, diagnostics)
            } else {
                ValidationIssue::error(IssueCode::NotFound, diagnostics)
            };
            issues.push(issue.with_location(location));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::IssueSeverity;
    use serde_json::json;

    fn default_id_pattern() -> Regex {
        Regex::new(&crate::SchemaConfig::default().id_pattern).unwrap()
    }

    fn plan(mode: ReferenceMode, allow_external: bool) -> ReferencesPlan {
        ReferencesPlan {
            mode,
            allow_external,
            id_pattern: default_id_pattern(),
        }
    }

    fn classify(reference: &str) -> ReferenceShape<'_> {
        super::classify(reference, &default_id_pattern())
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("#c1"), ReferenceShape::Fragment("c1"));
        assert_eq!(
            classify("urn:uuid:9d1b0c2e-8f7a-4b7e-9a57-0e9c0a1f2b3c"),
            ReferenceShape::Urn
        );
        assert_eq!(classify("urn:oid:1.2.3"), ReferenceShape::Urn);
        assert_eq!(classify("urn:uuid:not-a-uuid"), ReferenceShape::Invalid);
        assert_eq!(
            classify("http://example.org/fhir/Patient/1"),
            ReferenceShape::Absolute
        );
        assert_eq!(
            classify("/Patient/p1/_history/2"),
            ReferenceShape::Relative("Patient/p1".to_string())
        );
        assert_eq!(classify("patient/p1"), ReferenceShape::Invalid);
        assert_eq!(classify("Patient"), ReferenceShape::Invalid);
        assert_eq!(classify("Patient/p 1"), ReferenceShape::Invalid);
    }

    #[test]
    fn test_type_only_reports_malformed_references() {
        let resource = json!({
            "resourceType": "Observation",
            "subject": { "reference": "Patient/p1" },
            "performer": [{ "reference": "not a reference" }]
        });

        let mut issues = Vec::new();
        validate_references(
            &resource,
            "Observation",
            &plan(ReferenceMode::TypeOnly, true),
            None,
            &mut issues,
        );

        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].location.as_deref(),
            Some("Observation.performer[0].reference")
        );
    }

    #[test]
    fn test_fragments_resolve_against_contained() {
        let resource = json!({
            "resourceType": "Observation",
            "contained": [{ "resourceType": "Specimen", "id": "s1" }],
            "specimen": { "reference": "#s1" },
            "device": { "reference": "#missing" }
        });

        let mut issues = Vec::new();
        validate_references(
            &resource,
            "Observation",
            &plan(ReferenceMode::Existence, true),
            None,
            &mut issues,
        );

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].location.as_deref(), Some("Observation.device.reference"));
    }

    #[test]
    fn test_existence_within_bundle() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "fullUrl": "http://example.org/fhir/Patient/p1",
                  "resource": { "resourceType": "Patient", "id": "p1" } },
                { "fullUrl": "urn:uuid:9d1b0c2e-8f7a-4b7e-9a57-0e9c0a1f2b3c",
                  "resource": { "resourceType": "Practitioner" } }
            ]
        });
        let index = BundleIndex::from_bundle(&bundle);
        let resource = json!({
            "resourceType": "Observation",
            "subject": { "reference": "/Patient/p1/_history/1" },
            "performer": [
                { "reference": "urn:uuid:9d1b0c2e-8f7a-4b7e-9a57-0e9c0a1f2b3c" },
                { "reference": "urn:uuid:00000000-0000-4000-8000-000000000000" },
                { "reference": "http://example.org/fhir/Patient/p1" },
                { "reference": "Organization/missing" }
            ]
        });

        let mut issues = Vec::new();
        validate_references(
            &resource,
            "Bundle.entry[2].resource",
            &plan(ReferenceMode::Existence, true),
            Some(&index),
            &mut issues,
        );

        let summary: Vec<_> = issues
            .iter()
            .map(|i| (i.severity, i.location.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (
                    IssueSeverity::Error,
                    "Bundle.entry[2].resource.performer[1].reference".to_string()
                ),
                (
                    IssueSeverity::Information,
                    "Bundle.entry[2].resource.performer[3].reference".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_relative_ids_follow_configured_pattern() {
        let resource = json!({
            "resourceType": "Observation",
            "subject": { "reference": "Patient/p_1" },
            "focus": [{ "reference": "Patient/p_1/_history/v_2" }]
        });

        let mut issues = Vec::new();
        validate_references(
            &resource,
            "Observation",
            &plan(ReferenceMode::TypeOnly, true),
            None,
            &mut issues,
        );
        assert_eq!(issues.len(), 2);

        let widened = ReferencesPlan {
            id_pattern: Regex::new(r"^[A-Za-z0-9_\-\.]{1,64}$").unwrap(),
            ..plan(ReferenceMode::TypeOnly, true)
        };
        let mut issues = Vec::new();
        validate_references(&resource, "Observation", &widened, None, &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_external_references_block_when_disallowed() {
        let index = BundleIndex::from_bundle(&json!({ "resourceType": "Bundle", "entry": [] }));
        let resource = json!({
            "resourceType": "Observation",
            "subject": { "reference": "Patient/elsewhere" }
        });

        let mut issues = Vec::new();
        validate_references(
            &resource,
            "Observation",
            &plan(ReferenceMode::Existence, false),
            Some(&index),
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].code, IssueCode::NotFound);
    }
}
