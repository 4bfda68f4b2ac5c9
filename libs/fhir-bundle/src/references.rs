//! Reference discovery
//!
//! Walks the entire JSON tree of a resource and yields every `reference` string of every
//! Reference element: nested backbone elements, repeated elements, extensions
//! (`valueReference`) and contained resources included. Order follows the document.

use serde_json::Value;

const REFERENCE_ELEMENT: &str = "reference";

/// A mutable handle on one `reference` string inside a resource.
#[derive(Debug)]
pub struct ReferenceSlot<'a> {
    path: String,
    value: &'a mut String,
}

impl ReferenceSlot<'_> {
    /// Dotted element path, e.g. `performer[1].reference`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self) -> &str {
        self.value.as_str()
    }

    pub fn set(&mut self, value: impl Into<String>) {
        *self.value = value.into();
    }
}

/// A read-only view on one `reference` string inside a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceField<'a> {
    pub path: String,
    pub value: &'a str,
}

/// Collect every reference slot of `resource` for in-place rewriting.
pub fn find_references(resource: &mut Value) -> Vec<ReferenceSlot<'_>> {
    let mut out = Vec::new();
    collect_slots(resource, &mut Vec::new(), &mut out);
    out
}

/// Collect every reference of `resource` without borrowing it mutably.
pub fn references(resource: &Value) -> Vec<ReferenceField<'_>> {
    let mut out = Vec::new();
    collect_fields(resource, &mut Vec::new(), &mut out);
    out
}

fn collect_slots<'a>(
    value: &'a mut Value,
    path: &mut Vec<String>,
    out: &mut Vec<ReferenceSlot<'a>>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                if key == REFERENCE_ELEMENT {
                    match child {
                        Value::String(s) => out.push(ReferenceSlot {
                            path: render_path(path),
                            value: s,
                        }),
                        other => collect_slots(other, path, out),
                    }
                } else {
                    collect_slots(child, path, out);
                }
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                path.push(format!("[{}]", i));
                collect_slots(item, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn collect_fields<'a>(value: &'a Value, path: &mut Vec<String>, out: &mut Vec<ReferenceField<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                match child {
                    Value::String(s) if key == REFERENCE_ELEMENT => out.push(ReferenceField {
                        path: render_path(path),
                        value: s.as_str(),
                    }),
                    _ => collect_fields(child, path, out),
                }
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(format!("[{}]", i));
                collect_fields(item, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

// ["performer", "[1]", "reference"] -> "performer[1].reference"
fn render_path(path: &[String]) -> String {
    let mut out = String::new();
    for segment in path {
        if !out.is_empty() && !segment.starts_with('[') {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation() -> Value {
        json!({
            "resourceType": "Observation",
            "id": "obs1",
            "subject": { "reference": "Patient/p1", "display": "Jane" },
            "performer": [
                { "reference": "Practitioner/pr1" },
                { "display": "no reference here" },
                { "reference": "/Organization/o1" }
            ],
            "component": [{
                "extension": [{
                    "url": "http://example.org/ext",
                    "valueReference": { "reference": "Device/d1" }
                }]
            }],
            "contained": [{
                "resourceType": "Specimen",
                "id": "sp",
                "subject": { "reference": "Patient/p1" }
            }],
            "note": [{ "text": "Patient/p1 is not a reference" }]
        })
    }

    #[test]
    fn finds_nested_and_repeated_references() {
        let resource = observation();
        let found: Vec<(String, &str)> = references(&resource)
            .into_iter()
            .map(|f| (f.path, f.value))
            .collect();

        assert_eq!(
            found,
            vec![
                ("subject.reference".to_string(), "Patient/p1"),
                ("performer[0].reference".to_string(), "Practitioner/pr1"),
                ("performer[2].reference".to_string(), "/Organization/o1"),
                (
                    "component[0].extension[0].valueReference.reference".to_string(),
                    "Device/d1"
                ),
                ("contained[0].subject.reference".to_string(), "Patient/p1"),
            ]
        );
    }

    #[test]
    fn slots_write_back_in_place() {
        let mut resource = observation();
        for mut slot in find_references(&mut resource) {
            if slot.get() == "Patient/p1" {
                slot.set("urn:uuid:new");
            }
        }

        assert_eq!(resource["subject"]["reference"], "urn:uuid:new");
        assert_eq!(resource["contained"][0]["subject"]["reference"], "urn:uuid:new");
        assert_eq!(resource["performer"][0]["reference"], "Practitioner/pr1");
        assert_eq!(resource["note"][0]["text"], "Patient/p1 is not a reference");
    }

    #[test]
    fn mutable_and_read_only_walks_agree() {
        let mut resource = observation();
        let read_only: Vec<(String, String)> = references(&resource)
            .into_iter()
            .map(|f| (f.path, f.value.to_string()))
            .collect();
        let mutable: Vec<(String, String)> = find_references(&mut resource)
            .into_iter()
            .map(|s| (s.path().to_string(), s.get().to_string()))
            .collect();
        assert_eq!(read_only, mutable);
    }

    #[test]
    fn ignores_non_string_reference_members() {
        let mut resource = json!({
            "resourceType": "Basic",
            "reference": { "reference": "Patient/p2" },
            "other": { "reference": 42 }
        });
        let paths: Vec<String> = find_references(&mut resource)
            .into_iter()
            .map(|s| s.path().to_string())
            .collect();
        assert_eq!(paths, vec!["reference.reference".to_string()]);
    }

    #[test]
    fn resource_without_references_yields_nothing() {
        let mut resource = json!({ "resourceType": "Patient", "id": "p1" });
        assert!(find_references(&mut resource).is_empty());
        assert!(references(&resource).is_empty());
    }
}
