//! Structural checks every resource must pass
//!
//! - JSON object with a `resourceType`
//! - `id` (when present) is a string matching the configured pattern
//! - contained resources follow the same rules
//! - modifier extensions (if disallowed)

use super::get_resource_type;
use crate::validator::{IssueCode, ValidationIssue};
use crate::SchemaPlan;
use serde_json::Value;

/// Validates the shape of one resource. `path` is the FHIRPath-like location of the resource.
pub fn validate_schema(
    resource: &Value,
    path: &str,
    plan: &SchemaPlan,
    issues: &mut Vec<ValidationIssue>,
) {
    if !resource.is_object() {
        issues.push(
            ValidationIssue::error(
                IssueCode::Structure,
                "Resource must be a JSON object".to_string(),
            )
            .with_location(path.to_string()),
        );
        return;
    }

    match resource.get("resourceType") {
        Some(Value::String(rt)) if !rt.is_empty() => {}
        Some(_) => {
            issues.push(
                ValidationIssue::error(
                    IssueCode::Value,
                    "'resourceType' must be a non-empty string".to_string(),
                )
                .with_location(format!("{}.resourceType", path)),
            );
            return;
        }
        None => {
            issues.push(
                ValidationIssue::error(
                    IssueCode::Required,
                    "Resource must have a 'resourceType' field".to_string(),
                )
                .with_location(path.to_string()),
            );
            return;
        }
    }

    validate_id(resource, path, plan, issues);

    if let Some(contained) = resource.get("contained").and_then(Value::as_array) {
        for (idx, item) in contained.iter().enumerate() {
            let item_path = format!("{}.contained[{}]", path, idx);
            if get_resource_type(item).is_none() {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::Required,
                        "Contained resource must have a 'resourceType' field".to_string(),
                    )
                    .with_location(item_path),
                );
                continue;
            }
            validate_id(item, &item_path, plan, issues);
        }
    }

    if !plan.allow_modifier_extensions {
        check_modifier_extensions(resource, path, issues);
    }
}

fn validate_id(resource: &Value, path: &str, plan: &SchemaPlan, issues: &mut Vec<ValidationIssue>) {
    let Some(id) = resource.get("id") else {
        return;
    };
    let location = format!("{}.id", path);

    match id.as_str() {
        Some(id) if plan.id_pattern.is_match(id) => {}
        Some(id) => issues.push(
            ValidationIssue::error(
                IssueCode::Value,
                format!("Invalid resource id '{}'", id),
            )
            .with_location(location.clone())
            .with_expression(vec![location]),
        ),
        None => issues.push(
            ValidationIssue::error(IssueCode::Value, "'id' must be a string".to_string())
                .with_location(location.clone())
                .with_expression(vec![location]),
        ),
    }
}

fn check_modifier_extensions(resource: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let present = resource
        .get("modifierExtension")
        .and_then(Value::as_array)
        .is_some_and(|exts| !exts.is_empty());
    if present {
        issues.push(
            ValidationIssue::error(
                IssueCode::Extension,
                "Modifier extensions are not allowed by configuration".to_string(),
            )
            .with_location(format!("{}.modifierExtension", path))
            .with_expression(vec![format!("{}.modifierExtension", path)]),
        );
    }

    // Recursively check nested objects
    if let Some(obj) = resource.as_object() {
        for (key, value) in obj {
            if value.is_object() {
                check_modifier_extensions(value, &format!("{}.{}", path, key), issues);
            } else if let Some(arr) = value.as_array() {
                for (idx, item) in arr.iter().enumerate() {
                    if item.is_object() {
                        check_modifier_extensions(
                            item,
                            &format!("{}.{}[{}]", path, key, idx),
                            issues,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::json;

    fn plan(allow_modifier_extensions: bool) -> SchemaPlan {
        SchemaPlan {
            id_pattern: Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").unwrap(),
            allow_modifier_extensions,
        }
    }

    fn run(resource: &Value, plan: &SchemaPlan) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        validate_schema(resource, "Patient", plan, &mut issues);
        issues
    }

    #[test]
    fn test_valid_resource() {
        let resource = json!({"resourceType": "Patient", "id": "p-1.a"});
        assert!(run(&resource, &plan(false)).is_empty());
    }

    #[test]
    fn test_missing_resource_type() {
        let issues = run(&json!({"id": "123"}), &plan(false));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Required);
    }

    #[test]
    fn test_not_an_object() {
        let issues = run(&json!(["Patient"]), &plan(false));
        assert_eq!(issues[0].code, IssueCode::Structure);
    }

    #[test]
    fn test_invalid_ids() {
        let issues = run(&json!({"resourceType": "Patient", "id": "has space"}), &plan(false));
        assert_eq!(issues[0].location.as_deref(), Some("Patient.id"));

        let long_id = "x".repeat(65);
        assert_eq!(
            run(&json!({"resourceType": "Patient", "id": long_id}), &plan(false)).len(),
            1
        );
        assert_eq!(
            run(&json!({"resourceType": "Patient", "id": 7}), &plan(false)).len(),
            1
        );
    }

    #[test]
    fn test_contained_resources_are_checked() {
        let resource = json!({
            "resourceType": "Patient",
            "contained": [{ "id": "c1" }, { "resourceType": "Organization", "id": "bad id" }]
        });
        let issues = run(&resource, &plan(false));
        let locations: Vec<_> = issues.iter().filter_map(|i| i.location.as_deref()).collect();
        assert_eq!(
            locations,
            vec!["Patient.contained[0]", "Patient.contained[1].id"]
        );
    }

    #[test]
    fn test_modifier_extensions() {
        let resource = json!({
            "resourceType": "Patient",
            "contact": [{
                "modifierExtension": [{ "url": "http://example.org/x", "valueBoolean": true }]
            }]
        });

        let issues = run(&resource, &plan(false));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Extension);
        assert_eq!(
            issues[0].location.as_deref(),
            Some("Patient.contact[0].modifierExtension")
        );

        assert!(run(&resource, &plan(true)).is_empty());
    }
}
