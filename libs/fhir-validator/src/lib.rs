//! FHIR Validator - structural validation of resources and Bundles
//!
//! # Architecture
//!
//! The validator separates configuration, planning, and execution:
//!
//! ```text
//! ValidatorConfig (declarative) → ValidationPlan (executable) → Validator (reusable)
//! ```
//!
//! ## Phase 1: Declarative Configuration
//!
//! Define validation behavior via [`ValidatorConfig`]:
//! - What aspects to validate (schema, references, bundles)
//! - Which severity blocks acceptance and which issues are reported
//! - Preset-based or fully custom
//! - Serializable (YAML/JSON)
//!
//! ## Phase 2: Compiled Validation Plan
//!
//! Configuration compiles into a [`ValidationPlan`]:
//! - Ordered list of stateless validation steps
//! - Validates configuration correctness (including patterns)
//! - Eliminates disabled steps
//!
//! ## Phase 3: Reusable Validator & Stateless Execution
//!
//! [`Validator`] owns the plan:
//! - Built once, shared read-only across many validations
//! - Each `validate()` call creates a short-lived `ValidationRun`
//! - Returns structured [`ValidationOutcome`]
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use zunder_validator::{Preset, ValidatorConfig, Validator};
//!
//! let validator = Validator::from_config(&ValidatorConfig::preset(Preset::Server)).unwrap();
//! let outcome = validator.validate(&json!({
//!     "resourceType": "Bundle",
//!     "type": "collection",
//!     "entry": [{ "resource": { "resourceType": "Patient", "id": "p1" } }]
//! }));
//! assert!(outcome.valid);
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use zunder_models::BundleType;

mod error;
mod plan;
mod steps;
mod validator;

pub use error::ConfigError;
pub use plan::{BundlePlan, ReferencesPlan, ReportPlan, SchemaPlan, Step, ValidationPlan};
pub use validator::{IssueCode, IssueSeverity, ValidationIssue, ValidationOutcome, Validator};

// ============================================================================
// Core Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub references: ReferencesConfig,
    #[serde(default)]
    pub bundles: BundleConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Ingestion,
    Authoring,
    Server,
    Publication,
}

// ============================================================================
// Execution Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default = "default_max_issues")]
    pub max_issues: usize,
}

fn default_max_issues() -> usize {
    1000
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_issues: 1000,
        }
    }
}

// ============================================================================
// Report Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_include_warnings")]
    pub include_warnings: bool,
    #[serde(default)]
    pub include_information: bool,
    /// Lowest severity that makes a resource unacceptable.
    #[serde(default)]
    pub blocking_severity: IssueLevel,
}

fn default_include_warnings() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_warnings: true,
            include_information: false,
            blocking_severity: IssueLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IssueLevel {
    #[default]
    Error,
    Warning,
    Information,
}

impl From<IssueLevel> for IssueSeverity {
    fn from(level: IssueLevel) -> Self {
        match level {
            IssueLevel::Error => IssueSeverity::Error,
            IssueLevel::Warning => IssueSeverity::Warning,
            IssueLevel::Information => IssueSeverity::Information,
        }
    }
}

// ============================================================================
// Schema Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_schema_mode")]
    pub mode: SchemaMode,
    /// Pattern every resource `id` must match.
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,
    #[serde(default)]
    pub allow_modifier_extensions: bool,
}

fn default_schema_mode() -> SchemaMode {
    SchemaMode::On
}

fn default_id_pattern() -> String {
    r"^[A-Za-z0-9\-\.]{1,64}$".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaMode {
    Off,
    On,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            mode: SchemaMode::On,
            id_pattern: default_id_pattern(),
            allow_modifier_extensions: false,
        }
    }
}

// ============================================================================
// References Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencesConfig {
    #[serde(default)]
    pub mode: ReferenceMode,
    /// Relative references that resolve to nothing inside the Bundle are only informational.
    #[serde(default = "default_allow_external")]
    pub allow_external: bool,
}

fn default_allow_external() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferenceMode {
    #[default]
    Off,
    TypeOnly,
    Existence,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            mode: ReferenceMode::Off,
            allow_external: true,
        }
    }
}

// ============================================================================
// Bundle Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default)]
    pub mode: BundleMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<BundleType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BundleMode {
    #[default]
    Off,
    On,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            mode: BundleMode::Off,
            expected_type: None,
        }
    }
}

// ============================================================================
// ValidatorConfig Implementation
// ============================================================================

impl ValidatorConfig {
    pub fn preset(p: Preset) -> Self {
        let mut cfg = Self::defaults();
        cfg.preset = Some(p);

        match p {
            Preset::Ingestion => {
                cfg.schema.mode = SchemaMode::On;
                cfg.references.mode = ReferenceMode::Off;
                cfg.bundles.mode = BundleMode::On;
                cfg.bundles.expected_type = Some(BundleType::Collection);
            }
            Preset::Authoring => {
                cfg.schema.mode = SchemaMode::On;
                cfg.references.mode = ReferenceMode::TypeOnly;
                cfg.bundles.mode = BundleMode::On;
                cfg.report.include_information = true;
            }
            Preset::Server => {
                cfg.schema.mode = SchemaMode::On;
                cfg.references.mode = ReferenceMode::Existence;
                cfg.bundles.mode = BundleMode::On;
                cfg.bundles.expected_type = Some(BundleType::Collection);
            }
            Preset::Publication => {
                cfg.schema.mode = SchemaMode::On;
                cfg.references.mode = ReferenceMode::Existence;
                cfg.references.allow_external = false;
                cfg.bundles.mode = BundleMode::On;
                cfg.report.include_information = true;
                cfg.report.blocking_severity = IssueLevel::Warning;
            }
        }

        cfg
    }

    pub fn defaults() -> Self {
        Self {
            preset: None,
            report: ReportConfig::default(),
            exec: ExecConfig::default(),
            schema: SchemaConfig::default(),
            references: ReferencesConfig::default(),
            bundles: BundleConfig::default(),
        }
    }

    pub fn compile(&self) -> Result<ValidationPlan, ConfigError> {
        // Validate incompatible combinations
        if self.exec.max_issues == 0 {
            return Err(ConfigError::ZeroMaxIssues);
        }
        if self.bundles.expected_type.is_some() && self.bundles.mode == BundleMode::Off {
            return Err(ConfigError::ExpectedTypeRequiresBundles);
        }

        let id_pattern =
            Regex::new(&self.schema.id_pattern).map_err(|source| ConfigError::InvalidIdPattern {
                pattern: self.schema.id_pattern.clone(),
                source,
            })?;

        let mut steps = Vec::new();

        if self.schema.mode == SchemaMode::On {
            steps.push(Step::Schema(SchemaPlan {
                id_pattern: id_pattern.clone(),
                allow_modifier_extensions: self.schema.allow_modifier_extensions,
            }));
        }
        if self.references.mode != ReferenceMode::Off {
            steps.push(Step::References(ReferencesPlan::new(
                &self.references,
                id_pattern,
            )));
        }
        if self.bundles.mode == BundleMode::On {
            steps.push(Step::Bundles(BundlePlan::from(&self.bundles)));
        }

        Ok(ValidationPlan {
            steps,
            fail_fast: self.exec.fail_fast,
            max_issues: self.exec.max_issues,
            report: ReportPlan::from(&self.report),
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn builder() -> ValidatorConfigBuilder {
        ValidatorConfigBuilder::default()
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

// ============================================================================
// Builder Pattern
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct ValidatorConfigBuilder {
    cfg: Option<ValidatorConfig>,
}

impl ValidatorConfigBuilder {
    pub fn preset(mut self, p: Preset) -> Self {
        self.cfg = Some(ValidatorConfig::preset(p));
        self
    }

    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.cfg().schema.mode = mode;
        self
    }

    pub fn id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.cfg().schema.id_pattern = pattern.into();
        self
    }

    pub fn allow_modifier_extensions(mut self, allow: bool) -> Self {
        self.cfg().schema.allow_modifier_extensions = allow;
        self
    }

    pub fn reference_mode(mut self, mode: ReferenceMode) -> Self {
        self.cfg().references.mode = mode;
        self
    }

    pub fn allow_external_references(mut self, allow: bool) -> Self {
        self.cfg().references.allow_external = allow;
        self
    }

    pub fn bundle_mode(mut self, mode: BundleMode) -> Self {
        self.cfg().bundles.mode = mode;
        self
    }

    pub fn expected_bundle_type(mut self, bundle_type: BundleType) -> Self {
        self.cfg().bundles.expected_type = Some(bundle_type);
        self
    }

    pub fn blocking_severity(mut self, level: IssueLevel) -> Self {
        self.cfg().report.blocking_severity = level;
        self
    }

    pub fn include_warnings(mut self, include: bool) -> Self {
        self.cfg().report.include_warnings = include;
        self
    }

    pub fn include_information(mut self, include: bool) -> Self {
        self.cfg().report.include_information = include;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.cfg().exec.fail_fast = fail_fast;
        self
    }

    pub fn max_issues(mut self, max: usize) -> Self {
        self.cfg().exec.max_issues = max;
        self
    }

    pub fn build(self) -> ValidatorConfig {
        self.cfg.unwrap_or_default()
    }

    fn cfg(&mut self) -> &mut ValidatorConfig {
        self.cfg.get_or_insert_with(ValidatorConfig::defaults)
    }
}
