#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Act.
//!
//! - [`MemoryStore`] - in-memory backend with an operation log, latency and
//!   failure injection
//! - [`FieldEdit`] - reference action setting one field of a shared model
//! - [`init_tracing`] - `RUST_LOG`-driven subscriber for demos and debugging

pub mod field_edit;
pub mod store;

pub use field_edit::{FieldEdit, Model, model};
pub use store::{MemoryStore, StoreOp};

use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber could not be installed.
pub type TracingInitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// # Errors
///
/// Fails if a global subscriber is already set; the existing one stays in
/// place.
pub fn init_tracing(default_filter: &str) -> Result<(), TracingInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}
