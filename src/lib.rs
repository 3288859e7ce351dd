//! Stratus - reconciles a declarative serverless service against a remote
//! functions and containers platform
//!
//! A deploy diffs the local manifest against the platform's live state,
//! creates or updates what differs, deletes what is no longer declared when
//! single-source mode is on, and waits out the platform's asynchronous
//! provisioning before moving to the next stage.
//!
//! # Modules
//!
//! - [`client`] - collaborator traits over the remote platform
//! - [`kind`] - functions and containers as one generic resource kind
//! - [`reconcile`] - namespace, resource, trigger and domain convergence
//! - [`validate`] - aggregated manifest validation
//! - [`image`] - container image build and push
//! - [`upload`] - function archive upload
//! - [`pipeline`] - the ordered deploy stages
//! - [`remove`] - namespace removal
//! - [`token`] - access tokens for private resources
//! - [`info`] - deployed resources and their logs
//! - [`config`] - resolved credentials and wait policies

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod image;
pub mod info;
pub mod kind;
pub mod pipeline;
pub mod reconcile;
pub mod remove;
pub mod token;
pub mod upload;
pub mod validate;

#[cfg(test)]
mod testing;

pub use stratus_common::{Error, Result};
