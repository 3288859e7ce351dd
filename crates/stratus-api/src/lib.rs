//! HTTP client for the serverless functions and containers API
//!
//! One [`ApiClient`] talks to both products. Namespace calls go to the
//! product the client was configured for; function and container calls always
//! go to their own product. Every `get`/`find` call maps a 404 to `Ok(None)`.

#![deny(missing_docs)]

mod catalog;
mod client;
pub mod config;
mod namespaces;
mod resources;

pub use client::{ApiClient, AUTH_HEADER};
pub use config::ApiConfig;
pub use resources::UploadUrl;
