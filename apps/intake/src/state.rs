//! Shared application state

use crate::{
    config::{Config, ExecutorMode},
    services::{
        InMemoryTransactionExecutor, ReceiveBundleService, RemoteTransactionExecutor,
        TransactionExecutor,
    },
    Error, Result,
};
use std::sync::Arc;
use zunder_validator::Validator;

/// Everything a caller needs to run the intake gate.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub validator: Arc<Validator>,
    pub executor: Arc<dyn TransactionExecutor>,
    pub receive_service: Arc<ReceiveBundleService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let validator = Arc::new(Validator::from_config(&config.validation)?);

        let executor: Arc<dyn TransactionExecutor> = match config.executor.mode {
            ExecutorMode::Memory => {
                tracing::debug!("Using in-memory transaction executor");
                Arc::new(InMemoryTransactionExecutor::new())
            }
            ExecutorMode::Remote => {
                let base_url = config.executor.base_url.clone().ok_or_else(|| {
                    Error::Config("executor.base_url must be set when executor.mode=remote".into())
                })?;
                tracing::debug!(base_url = %base_url, "Using remote transaction executor");
                Arc::new(RemoteTransactionExecutor::new(
                    base_url,
                    config.executor.timeout(),
                )?)
            }
        };

        let receive_service = Arc::new(ReceiveBundleService::new(
            validator.clone(),
            executor.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            validator,
            executor,
            receive_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_mode_without_base_url_fails() {
        let mut config = Config::default();
        config.executor.mode = ExecutorMode::Remote;
        assert!(matches!(AppState::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_state_builds() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(!state.validator.plan().steps.is_empty());
    }
}
