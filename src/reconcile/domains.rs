//! Custom domain bindings
//!
//! Domains are reconciled best-effort on update: a hostname whose DNS is not
//! in place yet must not fail the deploy, so every failure is logged and
//! swallowed.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, instrument, warn};

use stratus_common::model::{CreateDomainRequest, Domain, ResourceRef};

use crate::client::DomainApi;

/// Hostnames to bind and bindings to remove
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainPlan {
    /// Declared hostnames with no binding yet
    pub create: Vec<String>,
    /// Ids of bindings whose hostname is no longer declared
    pub delete: Vec<String>,
}

impl DomainPlan {
    /// True when nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// Diff declared hostnames against existing bindings
pub fn plan_domains(declared: &[String], existing: &[Domain]) -> DomainPlan {
    let create = declared
        .iter()
        .filter(|host| !existing.iter().any(|d| &d.hostname == *host))
        .cloned()
        .collect();
    let delete = existing
        .iter()
        .filter(|d| !declared.contains(&d.hostname))
        .map(|d| d.id.clone())
        .collect();
    DomainPlan { create, delete }
}

/// Applies domain plans, logging instead of failing
pub struct DomainReconciler {
    api: Arc<dyn DomainApi>,
}

impl DomainReconciler {
    /// Reconciler over the given domain API
    pub fn new(api: Arc<dyn DomainApi>) -> Self {
        Self { api }
    }

    /// Bring the bindings of `owner` in line with `declared`
    #[instrument(skip(self, declared), fields(kind = %owner.kind, id = %owner.id))]
    pub async fn reconcile(&self, owner: &ResourceRef, name: &str, declared: &[String]) {
        let existing = match self.api.list_domains(owner).await {
            Ok(domains) => domains,
            Err(e) => {
                warn!(resource = %name, error = %e, "Could not list domains");
                return;
            }
        };

        let plan = plan_domains(declared, &existing);
        if plan.is_empty() {
            return;
        }

        let creates = plan.create.iter().map(|hostname| async move {
            let request = CreateDomainRequest {
                owner: owner.clone(),
                hostname: hostname.clone(),
            };
            match self.api.create_domain(&request).await {
                Ok(domain) => info!(resource = %name, hostname = %domain.hostname, "Creating domain"),
                Err(e) => {
                    let reason = e.to_string();
                    warn!(resource = %name, hostname = %hostname, "Error on domain {hostname}, reason: {reason}");
                    if reason.contains("could not validate") {
                        warn!("Ensure CNAME configuration is ok, it can take some time for a record to propagate");
                    }
                }
            }
        });
        let deletes = plan.delete.iter().map(|id| async move {
            match self.api.delete_domain(owner.kind, id).await {
                Ok(domain) => info!(resource = %name, hostname = %domain.hostname, "Deleting domain"),
                Err(e) => warn!(resource = %name, domain_id = %id, error = %e, "Could not delete domain"),
            }
        });

        join_all(creates).await;
        join_all(deletes).await;
    }
}
