//! Clip analysis worker.
//!
//! This crate provides:
//! - Environment-driven worker configuration
//! - Input validation for uploaded clips and observation documents
//! - A concurrent executor with per-clip time limits
//! - Structured clip logging and Prometheus metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod input;
pub mod logging;
pub mod metrics;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{ClipExecutor, ClipReport};
#[cfg(feature = "video")]
pub use executor::VideoBackends;
pub use input::{validate_input, ClipJob, ClipSource};
pub use logging::ClipLogger;
