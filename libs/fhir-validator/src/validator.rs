use crate::steps::references::BundleIndex;
use crate::steps::{bundles, references, schema};
use crate::{BundlePlan, ConfigError, ReferencesPlan, SchemaPlan, Step, ValidationPlan};
use serde_json::Value;

/// Reusable validator - owns the compiled plan, holds no per-run state
#[derive(Debug, Clone)]
pub struct Validator {
    plan: ValidationPlan,
}

impl Validator {
    pub fn new(plan: ValidationPlan) -> Self {
        Self { plan }
    }

    pub fn from_config(config: &crate::ValidatorConfig) -> Result<Self, ConfigError> {
        let plan = config.compile()?;
        Ok(Self::new(plan))
    }

    /// Validate one resource. A Bundle is validated as a whole: the envelope and every
    /// entry's resource.
    pub fn validate(&self, resource: &Value) -> ValidationOutcome {
        ValidationRun::new(&self.plan, resource).execute()
    }

    pub fn validate_batch(&self, resources: &[Value]) -> Vec<ValidationOutcome> {
        resources.iter().map(|r| self.validate(r)).collect()
    }

    pub fn plan(&self) -> &ValidationPlan {
        &self.plan
    }
}

/// Short-lived validation execution
struct ValidationRun<'a> {
    plan: &'a ValidationPlan,
    resource: &'a Value,
    bundle_index: Option<BundleIndex>,
    issues: Vec<ValidationIssue>,
}

impl<'a> ValidationRun<'a> {
    fn new(plan: &'a ValidationPlan, resource: &'a Value) -> Self {
        Self {
            plan,
            resource,
            bundle_index: None,
            issues: Vec::new(),
        }
    }

    fn execute(mut self) -> ValidationOutcome {
        for step in &self.plan.steps {
            if self.plan.fail_fast && self.is_blocked() {
                break;
            }

            if self.issues.len() >= self.plan.max_issues {
                break;
            }

            self.execute_step(step);
        }

        self.issues.truncate(self.plan.max_issues);
        let valid = !self.is_blocked();
        let report = self.plan.report;

        ValidationOutcome {
            resource_type: self.get_resource_type(),
            valid,
            issues: self
                .issues
                .into_iter()
                .filter(|i| report.includes(i.severity))
                .collect(),
        }
    }

    fn execute_step(&mut self, step: &Step) {
        match step {
            Step::Schema(plan) => self.validate_schema(plan),
            Step::References(plan) => self.validate_references(plan),
            Step::Bundles(plan) => self.validate_bundles(plan),
        }
    }

    fn validate_schema(&mut self, plan: &SchemaPlan) {
        let root = self.root_path();
        schema::validate_schema(self.resource, &root, plan, &mut self.issues);

        for (path, entry) in self.entry_resources() {
            schema::validate_schema(entry, &path, plan, &mut self.issues);
        }
    }

    fn validate_references(&mut self, plan: &ReferencesPlan) {
        if !self.is_bundle() {
            let root = self.root_path();
            references::validate_references(self.resource, &root, plan, None, &mut self.issues);
            return;
        }

        let resource = self.resource;
        let index = &*self
            .bundle_index
            .get_or_insert_with(|| BundleIndex::from_bundle(resource));
        for (path, entry) in entry_resources(resource) {
            references::validate_references(entry, &path, plan, Some(index), &mut self.issues);
        }
    }

    fn validate_bundles(&mut self, plan: &BundlePlan) {
        bundles::validate_bundle(self.resource, plan, &mut self.issues);
    }

    fn entry_resources(&self) -> Vec<(String, &'a Value)> {
        if self.is_bundle() {
            entry_resources(self.resource)
        } else {
            Vec::new()
        }
    }

    fn is_bundle(&self) -> bool {
        self.get_resource_type().as_deref() == Some("Bundle")
    }

    fn is_blocked(&self) -> bool {
        let threshold = self.plan.report.blocking_severity;
        self.issues.iter().any(|i| i.severity.is_at_least(threshold))
    }

    fn root_path(&self) -> String {
        self.get_resource_type()
            .unwrap_or_else(|| "Resource".to_string())
    }

    fn get_resource_type(&self) -> Option<String> {
        self.resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

fn entry_resources(bundle: &Value) -> Vec<(String, &Value)> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(idx, entry)| {
                    let resource = entry.get("resource").filter(|r| !r.is_null())?;
                    Some((format!("Bundle.entry[{}].resource", idx), resource))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Validation result for a single resource
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub resource_type: Option<String>,
    /// No issue at or above the blocking severity was found.
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn success(resource_type: Option<String>) -> Self {
        Self {
            resource_type,
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity.is_at_least(IssueSeverity::Error))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    pub fn information_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Information)
            .count()
    }

    /// An OperationOutcome always carries at least one issue; a clean result reports an
    /// informational "All OK".
    pub fn to_operation_outcome(&self) -> Value {
        let issues: Vec<Value> = if self.issues.is_empty() {
            vec![ValidationIssue::information(
                IssueCode::Informational,
                "All OK".to_string(),
            )
            .to_json()]
        } else {
            self.issues.iter().map(|i| i.to_json()).collect()
        };

        serde_json::json!({
            "resourceType": "OperationOutcome",
            "issue": issues
        })
    }
}

/// Individual validation issue
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    pub diagnostics: String,
    pub location: Option<String>,
    pub expression: Option<Vec<String>>,
}

impl ValidationIssue {
    pub fn new(severity: IssueSeverity, code: IssueCode, diagnostics: String) -> Self {
        Self {
            severity,
            code,
            diagnostics,
            location: None,
            expression: None,
        }
    }

    pub fn error(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Error, code, diagnostics)
    }

    pub fn warning(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Warning, code, diagnostics)
    }

    pub fn information(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Information, code, diagnostics)
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_expression(mut self, expression: Vec<String>) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut issue = serde_json::json!({
            "severity": self.severity.to_string().to_lowercase(),
            "code": self.code.to_string(),
            "diagnostics": self.diagnostics,
        });

        if let Some(ref loc) = self.location {
            issue["location"] = serde_json::json!([loc]);
        }

        if let Some(ref expr) = self.expression {
            issue["expression"] = serde_json::json!(expr);
        }

        issue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    fn rank(self) -> u8 {
        match self {
            Self::Fatal => 0,
            Self::Error => 1,
            Self::Warning => 2,
            Self::Information => 3,
        }
    }

    /// `true` when `self` is as severe as `threshold` or more.
    pub fn is_at_least(self, threshold: IssueSeverity) -> bool {
        self.rank() <= threshold.rank()
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "Fatal"),
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
            Self::Information => write!(f, "Information"),
        }
    }
}

/// Subset of the FHIR `IssueType` value set raised by this crate and its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    Invalid,
    Structure,
    Required,
    Value,
    Extension,
    Duplicate,
    NotFound,
    Incomplete,
    Processing,
    Exception,
    Transient,
    Informational,
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Invalid => "invalid",
            Self::Structure => "structure",
            Self::Required => "required",
            Self::Value => "value",
            Self::Extension => "extension",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not-found",
            Self::Incomplete => "incomplete",
            Self::Processing => "processing",
            Self::Exception => "exception",
            Self::Transient => "transient",
            Self::Informational => "informational",
        };
        write!(f, "{}", s)
    }
}
