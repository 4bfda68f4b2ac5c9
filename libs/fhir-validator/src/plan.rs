use crate::validator::IssueSeverity;
use crate::{BundleConfig, ReferenceMode, ReferencesConfig, ReportConfig};
use regex::Regex;
use zunder_models::BundleType;

/// Executable validation pipeline compiled from a [`crate::ValidatorConfig`].
#[derive(Debug, Clone)]
pub struct ValidationPlan {
    pub steps: Vec<Step>,
    pub fail_fast: bool,
    pub max_issues: usize,
    pub report: ReportPlan,
}

#[derive(Debug, Clone)]
pub enum Step {
    Schema(SchemaPlan),
    References(ReferencesPlan),
    Bundles(BundlePlan),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Schema(_) => "schema",
            Step::References(_) => "references",
            Step::Bundles(_) => "bundles",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub id_pattern: Regex,
    pub allow_modifier_extensions: bool,
}

#[derive(Debug, Clone)]
pub struct ReferencesPlan {
    pub mode: ReferenceMode,
    pub allow_external: bool,
    /// Same pattern the schema step applies to `id`; used for the id and version segments
    /// of relative references.
    pub id_pattern: Regex,
}

impl ReferencesPlan {
    pub fn new(cfg: &ReferencesConfig, id_pattern: Regex) -> Self {
        Self {
            mode: cfg.mode,
            allow_external: cfg.allow_external,
            id_pattern,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BundlePlan {
    pub expected_type: Option<BundleType>,
}

impl From<&BundleConfig> for BundlePlan {
    fn from(cfg: &BundleConfig) -> Self {
        Self {
            expected_type: cfg.expected_type,
        }
    }
}

/// Which issues end up in the outcome and which of them block.
#[derive(Debug, Clone, Copy)]
pub struct ReportPlan {
    pub include_warnings: bool,
    pub include_information: bool,
    pub blocking_severity: IssueSeverity,
}

impl From<&ReportConfig> for ReportPlan {
    fn from(cfg: &ReportConfig) -> Self {
        Self {
            include_warnings: cfg.include_warnings,
            include_information: cfg.include_information,
            blocking_severity: cfg.blocking_severity.into(),
        }
    }
}

impl ReportPlan {
    pub fn includes(&self, severity: IssueSeverity) -> bool {
        match severity {
            IssueSeverity::Fatal | IssueSeverity::Error => true,
            IssueSeverity::Warning => self.include_warnings,
            IssueSeverity::Information => self.include_information,
        }
    }
}
