pub mod receive_bundle;
pub mod transaction_executor;

pub use receive_bundle::{BundleValidator, ReceiveBundleService, ReceiveOutcome, ReceiveStage};
pub use transaction_executor::{
    InMemoryTransactionExecutor, RemoteTransactionExecutor, TransactionExecutor,
};
