use thiserror::Error;

/// Configuration combinations that cannot be compiled into a plan.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("exec.max_issues must be greater than zero")]
    ZeroMaxIssues,

    #[error("bundles.expected_type requires bundles.mode = On")]
    ExpectedTypeRequiresBundles,

    #[error("Invalid schema.id_pattern '{pattern}': {source}")]
    InvalidIdPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
