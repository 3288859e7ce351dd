//! Namespace reconciliation
//!
//! Exactly one namespace exists per service, named after it. It is created
//! when absent, patched in place when its env or secrets drifted, and the
//! reconciler does not return before it is `ready`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use stratus_common::model::{CreateNamespaceRequest, Namespace, Status, UpdateNamespaceRequest};
use stratus_common::retry::{poll_until, PollPolicy, NAMESPACE_POLL_INTERVAL};
use stratus_common::{Error, Result};

use crate::client::NamespaceApi;
use crate::reconcile::secrets::SecretDiffer;

/// Ensures the service namespace exists and is ready
pub struct NamespaceReconciler {
    api: Arc<dyn NamespaceApi>,
    secrets: SecretDiffer,
    policy: PollPolicy,
}

impl NamespaceReconciler {
    /// Reconciler polling every second, without bound
    pub fn new(api: Arc<dyn NamespaceApi>, secrets: SecretDiffer) -> Self {
        Self {
            api,
            secrets,
            policy: PollPolicy::every(NAMESPACE_POLL_INTERVAL),
        }
    }

    /// Override the wait policy
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Find or create the namespace, apply env and secret drift, and wait
    /// for it to be ready.
    #[instrument(skip(self, env, secrets))]
    pub async fn ensure(
        &self,
        name: &str,
        env: &BTreeMap<String, String>,
        secrets: &BTreeMap<String, String>,
    ) -> Result<Namespace> {
        let Some(existing) = self.api.find_namespace(name).await? else {
            info!(namespace = %name, "Creating namespace");
            let created = self
                .api
                .create_namespace(&CreateNamespaceRequest {
                    name: name.to_string(),
                    environment_variables: env.clone(),
                    secret_environment_variables: self.secrets.initial(secrets),
                })
                .await?;
            return self.wait_until_ready(&created).await;
        };

        if existing.status.is_error() {
            return Err(namespace_error(&existing));
        }

        let namespace = self.apply_drift(existing, env, secrets).await?;
        if namespace.status.is_ready() {
            return Ok(namespace);
        }
        self.wait_until_ready(&namespace).await
    }

    async fn apply_drift(
        &self,
        existing: Namespace,
        env: &BTreeMap<String, String>,
        secrets: &BTreeMap<String, String>,
    ) -> Result<Namespace> {
        let mutations = self
            .secrets
            .diff(&existing.secret_environment_variables, secrets);
        let request = UpdateNamespaceRequest {
            environment_variables: (existing.environment_variables != *env).then(|| env.clone()),
            secret_environment_variables: Some(mutations),
        };

        if request.is_empty() {
            debug!(namespace = %existing.name, "Namespace is up to date");
            return Ok(existing);
        }

        info!(namespace = %existing.name, "Updating namespace");
        // The returned namespace may be back to pending
        self.api.update_namespace(&existing.id, &request).await
    }

    async fn wait_until_ready(&self, namespace: &Namespace) -> Result<Namespace> {
        let what = format!("namespace {}", namespace.name);
        poll_until(&self.policy, &what, move || async move {
            let Some(current) = self.api.get_namespace(&namespace.id).await? else {
                return Err(Error::remote_state(
                    "namespace",
                    &namespace.name,
                    "namespace was deleted while waiting for it to be ready",
                ));
            };
            match current.status {
                Status::Error => Err(namespace_error(&current)),
                Status::Ready => Ok(Some(current)),
                _ => {
                    debug!(namespace = %current.name, status = %current.status, "Waiting for namespace");
                    Ok(None)
                }
            }
        })
        .await
    }
}

fn namespace_error(ns: &Namespace) -> Error {
    Error::remote_state(
        "namespace",
        &ns.name,
        ns.error_message.clone().unwrap_or_default(),
    )
}
