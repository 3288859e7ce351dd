//! Common types for stratus: wire model, service manifest, errors, polling

#![deny(missing_docs)]

pub mod error;
pub mod manifest;
pub mod model;
pub mod retry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Regions the platform serves
pub const REGIONS: &[&str] = &["fr-par", "nl-ams", "pl-waw"];

/// Default region when neither the CLI nor the manifest names one
pub const DEFAULT_REGION: &str = "fr-par";
