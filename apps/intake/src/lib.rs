//! Validation-gated intake of FHIR collection Bundles
//!
//! A collection Bundle is validated, re-identified into a transaction Bundle and submitted to a
//! transaction executor, in that order. Nothing is transformed or submitted when validation
//! reports a blocking issue.
//!
//! ```rust,no_run
//! use zunder_intake::{config::Config, services::ReceiveOutcome, state::AppState};
//! use zunder_models::Bundle;
//!
//! # async fn run(bundle: Bundle) -> zunder_intake::Result<()> {
//! let state = AppState::new(Config::default())?;
//! match state.receive_service.receive(bundle).await? {
//!     ReceiveOutcome::Committed { response, .. } => println!("{} entries", response.entry_count()),
//!     ReceiveOutcome::Rejected(outcome) => println!("{} errors", outcome.error_count()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod state;

pub use error::{Error, Result};
