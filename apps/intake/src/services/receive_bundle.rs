//! Validation-gated Bundle intake
//!
//! ```text
//! RECEIVED → VALIDATING → REJECTED
//!                       → TRANSFORMING → SUBMITTING → DONE
//! ```
//!
//! A collection Bundle is validated as a whole. Only when no blocking issue is reported is it
//! converted into a transaction (re-identified, references rewritten) and handed to the
//! transaction executor. The validation outcome is returned in both cases.

use crate::services::TransactionExecutor;
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use zunder_models::Bundle;
use zunder_validator::{ValidationOutcome, Validator};

/// Validates a whole Bundle before anything is committed.
#[async_trait]
pub trait BundleValidator: Send + Sync {
    async fn validate(&self, bundle: &Bundle) -> Result<ValidationOutcome>;
}

#[async_trait]
impl BundleValidator for Validator {
    async fn validate(&self, bundle: &Bundle) -> Result<ValidationOutcome> {
        let value = bundle.to_value()?;
        Ok(Validator::validate(self, &value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStage {
    Received,
    Validating,
    Rejected,
    Transforming,
    Submitting,
    Done,
}

impl fmt::Display for ReceiveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Transforming => "transforming",
            Self::Submitting => "submitting",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub enum ReceiveOutcome {
    /// Validation reported a blocking issue; nothing was transformed or submitted.
    Rejected(ValidationOutcome),
    /// The transaction was executed.
    Committed {
        response: Bundle,
        validation: ValidationOutcome,
    },
}

impl ReceiveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReceiveOutcome::Committed { .. })
    }

    pub fn validation(&self) -> &ValidationOutcome {
        match self {
            ReceiveOutcome::Rejected(outcome) => outcome,
            ReceiveOutcome::Committed { validation, .. } => validation,
        }
    }

    pub fn response(&self) -> Option<&Bundle> {
        match self {
            ReceiveOutcome::Rejected(_) => None,
            ReceiveOutcome::Committed { response, .. } => Some(response),
        }
    }
}

/// Orchestrates validate → transform → submit for one collection Bundle per call.
pub struct ReceiveBundleService {
    validator: Arc<dyn BundleValidator>,
    executor: Arc<dyn TransactionExecutor>,
}

impl ReceiveBundleService {
    pub fn new(validator: Arc<dyn BundleValidator>, executor: Arc<dyn TransactionExecutor>) -> Self {
        Self {
            validator,
            executor,
        }
    }

    pub async fn receive(&self, bundle: Bundle) -> Result<ReceiveOutcome> {
        tracing::debug!(
            stage = %ReceiveStage::Received,
            entries = bundle.entry_count(),
            "Bundle received"
        );
        if !bundle.is_collection() {
            return Err(Error::InvalidResource(format!(
                "Expected a collection Bundle, got {:?}",
                bundle.bundle_type
            )));
        }

        tracing::debug!(stage = %ReceiveStage::Validating, "Validating bundle");
        let validation = self.validator.validate(&bundle).await.map_err(|e| {
            tracing::warn!(stage = %ReceiveStage::Validating, error = %e, "Validator failed");
            Error::collaborator(ReceiveStage::Validating, e)
        })?;

        if !validation.valid {
            tracing::info!(
                stage = %ReceiveStage::Rejected,
                errors = validation.error_count(),
                warnings = validation.warning_count(),
                "Bundle rejected by validation"
            );
            return Ok(ReceiveOutcome::Rejected(validation));
        }

        tracing::debug!(stage = %ReceiveStage::Transforming, "Converting to transaction");
        let transaction = zunder_bundle::to_transaction_bundle(bundle)?;
        let entries = transaction.entry_count();

        tracing::debug!(stage = %ReceiveStage::Submitting, entries, "Submitting transaction");
        let response = self
            .executor
            .execute_transaction(transaction)
            .await
            .map_err(|e| {
                tracing::warn!(stage = %ReceiveStage::Submitting, error = %e, "Executor failed");
                Error::collaborator(ReceiveStage::Submitting, e)
            })?;

        tracing::info!(
            stage = %ReceiveStage::Done,
            entries,
            warnings = validation.warning_count(),
            "Bundle committed"
        );
        Ok(ReceiveOutcome::Committed {
            response,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryTransactionExecutor;
    use serde_json::json;
    use zunder_validator::{Preset, ValidatorConfig};

    fn service() -> ReceiveBundleService {
        let validator = Validator::from_config(&ValidatorConfig::preset(Preset::Server)).unwrap();
        ReceiveBundleService::new(
            Arc::new(validator),
            Arc::new(InMemoryTransactionExecutor::new()),
        )
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ReceiveStage::Validating.to_string(), "validating");
        assert_eq!(ReceiveStage::Done.to_string(), "done");
    }

    #[tokio::test]
    async fn test_non_collection_is_refused_up_front() {
        let bundle = Bundle::from_value(&json!({
            "resourceType": "Bundle",
            "type": "batch",
            "entry": []
        }))
        .unwrap();

        let err = service().receive(bundle).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResource(_)));
    }

    #[tokio::test]
    async fn test_validator_adapter_reports_bundle_issues() {
        let validator = Validator::from_config(&ValidatorConfig::preset(Preset::Server)).unwrap();
        let bundle = Bundle::from_value(&json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{ "resource": { "resourceType": "Patient" } }]
        }))
        .unwrap();

        let outcome = BundleValidator::validate(&validator, &bundle).await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(
            outcome.issues[0].location.as_deref(),
            Some("Bundle.entry[0]")
        );
    }
}
