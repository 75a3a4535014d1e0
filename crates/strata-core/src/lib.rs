//! strata-core library.
//!
//! Layered state: one process-wide global container, one container per
//! session, and a browser-persisted container per browser profile, all
//! observing a single shared task result.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in library code, each mapping to an
//!   [`error::ErrorCode`]; `anyhow::Result` only for config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Randomness and time**: always injected via [`entropy::Entropy`] and
//!   [`clock::Clock`], never read from globals.

pub mod clock;
pub mod config;
pub mod container;
pub mod dataset;
pub mod entropy;
pub mod env;
pub mod error;
pub mod format;
pub mod layers;
pub mod lock;
pub mod profile;
pub mod store;
pub mod task;
pub mod text;
pub mod value;

pub use container::{ExportForm, StateContainer, StateError, StateSlot};
pub use dataset::Dataset;
pub use layers::{Session, StateLayers};
pub use task::{TaskHandle, TaskResult};
pub use value::VersionedValue;
