//! Reconciliation of declared state against the platform
//!
//! Each submodule owns one convergence step. They are composed by
//! [`crate::pipeline`]; none of them knows about the others' ordering.

use std::fmt::Display;

use futures::future::join_all;
use tracing::error;

use stratus_common::Result;

pub mod domains;
pub mod namespace;
pub mod resources;
pub mod runtime;
pub mod secrets;
pub mod single_source;
pub mod triggers;
pub mod waiter;

pub use domains::{plan_domains, DomainPlan, DomainReconciler};
pub use namespace::NamespaceReconciler;
pub use resources::{Cleanup, Reconciled, ReconciledResource, ResourceReconciler};
pub use runtime::{validate_runtime, ValidatedRuntime};
pub use secrets::{Argon2Verifier, SecretDiffer, SecretVerifier};
pub use single_source::elements_to_remove;
pub use triggers::TriggerReconciler;
pub use waiter::wait_until_ready;

/// Run sibling operations to completion, log every failure, and return the
/// first error in input order.
///
/// A failing sibling never cancels the others.
pub(crate) async fn settle_all<L, T, I, Fut>(what: &str, siblings: I) -> Result<Vec<T>>
where
    L: Display,
    I: IntoIterator<Item = (L, Fut)>,
    Fut: std::future::Future<Output = Result<T>>,
{
    let (labels, futures): (Vec<L>, Vec<Fut>) = siblings.into_iter().unzip();
    let outcomes = join_all(futures).await;

    let mut values = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    for (label, outcome) in labels.iter().zip(outcomes) {
        match outcome {
            Ok(value) => values.push(value),
            Err(e) => {
                error!(resource = %label, error = %e, "{what} failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(values),
    }
}
