//! Generic create/update reconciliation for functions and containers
//!
//! One list call per pass; declared resources are joined to remote ones by
//! name. Matches are updated, the rest created, all concurrently. In
//! single-source mode undeclared remote resources are deleted in background
//! tasks that never fail the pass.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use stratus_common::model::{
    CreateRequest, Namespace, RemoteResource, ResourceRef, RuntimeDescriptor, UpdateRequest,
};
use stratus_common::retry::{poll_until, PollPolicy, DELETE_POLL_INTERVAL, NAMESPACE_POLL_INTERVAL};
use stratus_common::{Error, Result};

use crate::client::{ResourceApi, RuntimeApi};
use crate::kind::{DeclaredResource, ResourceKind, SpecInput};
use crate::reconcile::domains::DomainReconciler;
use crate::reconcile::runtime::validate_runtime;
use crate::reconcile::secrets::SecretDiffer;
use crate::reconcile::single_source::elements_to_remove;

/// A remote resource after create or update, paired with its declaration.
///
/// Later stages need declaration-only data (handler, build directory,
/// events) that the platform does not store.
#[derive(Debug)]
pub struct ReconciledResource<K: ResourceKind> {
    /// State returned by the create or update call
    pub remote: K::Remote,
    /// Local declaration it was reconciled from
    pub declared: K::Declared,
}

impl<K: ResourceKind> Clone for ReconciledResource<K> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            declared: self.declared.clone(),
        }
    }
}

impl<K: ResourceKind> ReconciledResource<K> {
    /// Reference used by trigger, domain and token calls
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            kind: K::KIND,
            id: self.remote.id().to_string(),
        }
    }
}

/// Background deletions started by single-source mode
#[derive(Debug, Default)]
pub struct Cleanup {
    handles: Vec<JoinHandle<()>>,
}

impl Cleanup {
    /// Number of deletions in flight
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when nothing was scheduled for deletion
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Merge another set of deletions into this one
    pub fn extend(&mut self, other: Cleanup) {
        self.handles.extend(other.handles);
    }

    /// Wait for every deletion to finish. Failures were already logged.
    pub async fn settle(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cleanup task panicked");
            }
        }
    }
}

/// Result of one reconciliation pass
#[derive(Debug)]
pub struct Reconciled<K: ResourceKind> {
    /// Created or updated resources, in declaration order
    pub resources: Vec<ReconciledResource<K>>,
    /// Orphan deletions still running
    pub cleanup: Cleanup,
}

/// Reconciles every declared resource of kind `K` in a namespace
pub struct ResourceReconciler<K: ResourceKind> {
    api: Arc<dyn ResourceApi<K>>,
    runtimes: Arc<dyn RuntimeApi>,
    domains: DomainReconciler,
    secrets: SecretDiffer,
    single_source: bool,
    default_runtime: Option<String>,
    settle_policy: PollPolicy,
    delete_policy: PollPolicy,
}

impl<K: ResourceKind> ResourceReconciler<K> {
    /// Reconciler with unbounded waits and single-source mode off
    pub fn new(
        api: Arc<dyn ResourceApi<K>>,
        runtimes: Arc<dyn RuntimeApi>,
        domains: DomainReconciler,
        secrets: SecretDiffer,
    ) -> Self {
        Self {
            api,
            runtimes,
            domains,
            secrets,
            single_source: false,
            default_runtime: None,
            settle_policy: PollPolicy::every(NAMESPACE_POLL_INTERVAL),
            delete_policy: PollPolicy::every(DELETE_POLL_INTERVAL),
        }
    }

    /// Delete remote resources that are not declared
    pub fn with_single_source(mut self, single_source: bool) -> Self {
        self.single_source = single_source;
        self
    }

    /// Runtime used when a declaration does not name one
    pub fn with_default_runtime(mut self, runtime: Option<String>) -> Self {
        self.default_runtime = runtime;
        self
    }

    /// Override the wait policies for pre-update settling and orphan deletion
    pub fn with_policies(mut self, settle: PollPolicy, delete: PollPolicy) -> Self {
        self.settle_policy = settle;
        self.delete_policy = delete;
        self
    }

    /// Create or update every declared resource.
    ///
    /// Every resource is attempted even when a sibling fails. All failures
    /// are logged; the first one in declaration order is returned.
    #[instrument(skip_all, fields(kind = %K::KIND, namespace = %namespace.name))]
    pub async fn reconcile(
        &self,
        namespace: &Namespace,
        declared: &[K::Declared],
    ) -> Result<Reconciled<K>> {
        let existing = self.api.list(&namespace.id).await?;

        let orphans = elements_to_remove(
            self.single_source,
            &existing,
            declared.iter().map(|d| d.name()),
        );
        let cleanup = self.spawn_cleanup(orphans);

        let catalog = self.load_catalog(declared).await;

        let outcomes = join_all(declared.iter().map(|decl| {
            let current = existing.iter().find(|r| r.name() == decl.name());
            self.apply(namespace, decl, current, &catalog)
        }))
        .await;

        let mut resources = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (decl, outcome) in declared.iter().zip(outcomes) {
            match outcome {
                Ok(resource) => resources.push(resource),
                Err(e) => {
                    error!(kind = %K::KIND, resource = %decl.name(), error = %e, "Reconciliation failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => {
                // Orphan deletions keep running; the caller aborts anyway
                drop(cleanup);
                Err(e)
            }
            None => Ok(Reconciled { resources, cleanup }),
        }
    }

    async fn apply(
        &self,
        namespace: &Namespace,
        decl: &K::Declared,
        current: Option<&K::Remote>,
        catalog: &[RuntimeDescriptor],
    ) -> Result<ReconciledResource<K>> {
        let runtime = K::runtime(decl, self.default_runtime.as_deref())
            .map(|r| validate_runtime(&r, catalog))
            .transpose()?
            .map(|v| v.name);

        let remote = match current {
            None => self.create(namespace, decl, runtime).await?,
            Some(current) => self.update(namespace, decl, current, runtime).await?,
        };

        Ok(ReconciledResource {
            remote,
            declared: decl.clone(),
        })
    }

    async fn create(
        &self,
        namespace: &Namespace,
        decl: &K::Declared,
        runtime: Option<String>,
    ) -> Result<K::Remote> {
        info!(kind = %K::KIND, resource = %decl.name(), "Creating");
        if !decl.custom_domains().is_empty() {
            warn!(
                kind = %K::KIND,
                resource = %decl.name(),
                "Custom domains are applied on the next deploy, once the {} exists",
                K::KIND
            );
        }

        let spec = K::build_spec(
            decl,
            SpecInput {
                namespace,
                secrets: self.secrets.initial(decl.secrets()),
                runtime,
                existing: None,
            },
        )?;
        self.api
            .create(&CreateRequest {
                name: decl.name().to_string(),
                namespace_id: namespace.id.clone(),
                spec,
            })
            .await
    }

    async fn update(
        &self,
        namespace: &Namespace,
        decl: &K::Declared,
        current: &K::Remote,
        runtime: Option<String>,
    ) -> Result<K::Remote> {
        let settled;
        let current = if K::SETTLE_BEFORE_UPDATE && !current.status().is_final() {
            settled = self.wait_until_settled(current).await?;
            &settled
        } else {
            current
        };

        info!(kind = %K::KIND, resource = %decl.name(), "Updating");
        let spec = K::build_spec(
            decl,
            SpecInput {
                namespace,
                secrets: self.secrets.diff(current.hashed_secrets(), decl.secrets()),
                runtime,
                existing: Some(current),
            },
        )?;
        let updated = self
            .api
            .update(current.id(), &UpdateRequest::without_redeploy(spec))
            .await?;

        let owner = ResourceRef {
            kind: K::KIND,
            id: current.id().to_string(),
        };
        self.domains
            .reconcile(&owner, decl.name(), decl.custom_domains())
            .await;

        Ok(updated)
    }

    /// The platform rejects updates while a rollout is in progress
    async fn wait_until_settled(&self, current: &K::Remote) -> Result<K::Remote> {
        let what = format!("{} {} to settle", K::KIND, current.name());
        let api = &self.api;
        poll_until(&self.settle_policy, &what, move || async move {
            match api.get(current.id()).await? {
                Some(r) if r.status().is_final() => Ok(Some(r)),
                Some(r) => {
                    debug!(kind = %K::KIND, resource = %r.name(), status = %r.status(), "Waiting before update");
                    Ok(None)
                }
                None => Err(Error::remote_state(
                    K::KIND.as_str(),
                    current.name(),
                    "deleted while waiting to update it",
                )),
            }
        })
        .await
    }

    /// A catalog fetch failure yields an empty catalog: every runtime then
    /// fails validation with a "cannot list runtimes" diagnostic.
    async fn load_catalog(&self, declared: &[K::Declared]) -> Vec<RuntimeDescriptor> {
        let needs_catalog = declared
            .iter()
            .any(|d| K::runtime(d, self.default_runtime.as_deref()).is_some());
        if !needs_catalog {
            return Vec::new();
        }

        match self.runtimes.list_runtimes().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Could not list runtimes");
                Vec::new()
            }
        }
    }

    fn spawn_cleanup(&self, orphans: Vec<String>) -> Cleanup {
        let handles = orphans
            .into_iter()
            .map(|id| {
                let api = Arc::clone(&self.api);
                let policy = self.delete_policy.clone();
                tokio::spawn(async move {
                    if let Err(e) = delete_and_wait::<K>(api.as_ref(), &id, &policy).await {
                        warn!(kind = %K::KIND, id = %id, error = %e, "Could not delete undeclared resource");
                    }
                })
            })
            .collect();
        Cleanup { handles }
    }
}

async fn delete_and_wait<K: ResourceKind>(
    api: &dyn ResourceApi<K>,
    id: &str,
    policy: &PollPolicy,
) -> Result<()> {
    let deleted = api.delete(id).await?;
    info!(kind = %K::KIND, resource = %deleted.name(), "Deleting undeclared resource");

    let what = format!("{} {} to be deleted", K::KIND, deleted.name());
    poll_until(policy, &what, move || async move {
        Ok(api.get(id).await?.is_none().then_some(()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use stratus_common::manifest::{ContainerDecl, FunctionDecl};
    use stratus_common::model::{
        Container, Function, FunctionSpec, RuntimeStatus, SecretEnvVar, Status,
    };

    use crate::kind::{Containers, Functions};
    use crate::reconcile::secrets::Argon2Verifier;
    use crate::testing::FakePlatform;

    fn differ() -> SecretDiffer {
        SecretDiffer::new(Arc::new(Argon2Verifier), Arc::new(|_| None))
    }

    fn function_reconciler(platform: &Arc<FakePlatform>) -> ResourceReconciler<Functions> {
        ResourceReconciler::new(
            platform.clone(),
            platform.clone(),
            DomainReconciler::new(platform.clone()),
            differ(),
        )
        .with_default_runtime(Some("node22".to_string()))
    }

    fn container_reconciler(platform: &Arc<FakePlatform>) -> ResourceReconciler<Containers> {
        ResourceReconciler::new(
            platform.clone(),
            platform.clone(),
            DomainReconciler::new(platform.clone()),
            differ(),
        )
    }

    fn function(name: &str) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            handler: Some(format!("src/{name}.handle")),
            memory_limit: Some(256),
            secret: BTreeMap::from([("TOKEN".to_string(), "s3cret".to_string())]),
            ..Default::default()
        }
    }

    // ==========================================================================
    // Story Tests: a service converging on the platform
    // ==========================================================================

    /// Story: fn1 exists, fn2 is new, fn3 was removed from the declaration
    #[tokio::test]
    async fn story_single_source_converges_remote_set() {
        let platform = Arc::new(FakePlatform::with_node_runtimes());
        let ns = platform.seed_namespace("shop");
        let fn1 = platform.seed_function(&ns.id, "fn1", Status::Ready);
        let fn3 = platform.seed_function(&ns.id, "fn3", Status::Ready);

        let reconciled = function_reconciler(&platform)
            .with_single_source(true)
            .reconcile(&ns, &[function("fn1"), function("fn2")])
            .await
            .unwrap();
        reconciled.cleanup.settle().await;

        let state = platform.state();
        assert_eq!(state.function_updates.len(), 1);
        assert_eq!(state.function_updates[0].0, fn1);
        assert_eq!(state.function_creates.len(), 1);
        assert_eq!(state.function_creates[0].name, "fn2");
        assert_eq!(state.deleted, vec![fn3]);

        let mut names: Vec<&str> = state.functions.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["fn1", "fn2"]);
    }

    /// Story: deploying the same declaration twice changes nothing the second time
    #[tokio::test]
    async fn story_create_then_update_is_idempotent() {
        let platform = Arc::new(FakePlatform::with_node_runtimes());
        let ns = platform.seed_namespace("shop");
        let reconciler = function_reconciler(&platform);

        reconciler.reconcile(&ns, &[function("hello")]).await.unwrap();
        reconciler.reconcile(&ns, &[function("hello")]).await.unwrap();

        let state = platform.state();
        let created = &state.function_creates[0];
        let (_, updated) = &state.function_updates[0];

        assert_eq!(
            created.spec.secret_environment_variables,
            vec![SecretEnvVar::set("TOKEN", "s3cret")]
        );
        assert!(updated.spec.secret_environment_variables.is_empty());
        assert!(!updated.redeploy);
        assert_eq!(
            updated.spec,
            FunctionSpec {
                secret_environment_variables: vec![],
                ..created.spec.clone()
            }
        );
    }

    #[tokio::test]
    async fn without_single_source_undeclared_resources_stay() {
        let platform = Arc::new(FakePlatform::with_node_runtimes());
        let ns = platform.seed_namespace("shop");
        platform.seed_function(&ns.id, "legacy", Status::Ready);

        let reconciled = function_reconciler(&platform)
            .reconcile(&ns, &[function("fn1")])
            .await
            .unwrap();

        assert!(reconciled.cleanup.is_empty());
        assert_eq!(platform.state().functions.len(), 2);
    }

    #[tokio::test]
    async fn unknown_runtime_fails_only_that_resource() {
        let platform = Arc::new(FakePlatform::with_node_runtimes());
        let ns = platform.seed_namespace("shop");

        let bad = FunctionDecl {
            runtime: Some("cobol85".to_string()),
            ..function("bad")
        };
        let err = function_reconciler(&platform)
            .reconcile(&ns, &[bad, function("good")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownRuntime { .. }));
        assert!(err.to_string().contains("node22"));

        // The sibling was still created
        let state = platform.state();
        assert_eq!(state.function_creates.len(), 1);
        assert_eq!(state.function_creates[0].name, "good");
    }

    #[tokio::test]
    async fn catalog_failure_reads_as_unlistable() {
        let platform = Arc::new(FakePlatform::default());
        platform.state().fail_runtimes = true;
        let ns = platform.seed_namespace("shop");

        let err = function_reconciler(&platform)
            .reconcile(&ns, &[function("hello")])
            .await
            .unwrap_err();

        assert!(err.to_string().ends_with("cannot list runtimes"));
    }

    #[tokio::test]
    async fn containers_skip_runtime_catalog() {
        let platform = Arc::new(FakePlatform::default());
        platform.state().fail_runtimes = true;
        let ns = platform.seed_namespace("shop");

        let reconciled = container_reconciler(&platform)
            .reconcile(
                &ns,
                &[ContainerDecl {
                    name: "api".to_string(),
                    port: Some(8080),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();

        let api: &Container = &reconciled.resources[0].remote;
        assert_eq!(api.registry_image, format!("{}/api:latest", ns.registry_endpoint));
    }

    #[tokio::test(start_paused = true)]
    async fn container_mid_rollout_is_settled_before_update() {
        let platform = Arc::new(FakePlatform::default());
        let ns = platform.seed_namespace("shop");
        let id = platform.seed_container(&ns.id, "api", Status::Pending);
        platform.ripen_after(&id, 3);

        let started = tokio::time::Instant::now();
        container_reconciler(&platform)
            .with_policies(
                PollPolicy::every(Duration::from_secs(1)),
                PollPolicy::every(Duration::from_secs(1)),
            )
            .reconcile(
                &ns,
                &[ContainerDecl {
                    name: "api".to_string(),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(platform.state().container_updates.len(), 1);
    }

    #[tokio::test]
    async fn reconciled_resource_keeps_declaration() {
        let platform = Arc::new(FakePlatform::with_node_runtimes());
        let ns = platform.seed_namespace("shop");

        let reconciled = function_reconciler(&platform)
            .reconcile(&ns, &[function("hello")])
            .await
            .unwrap();

        let hello = &reconciled.resources[0];
        let remote: &Function = &hello.remote;
        assert_eq!(hello.declared.handler.as_deref(), Some("src/hello.handle"));
        assert_eq!(remote.runtime, "node22");
        assert_eq!(hello.resource_ref(), ResourceRef::function(remote.id.clone()));
    }

    #[tokio::test]
    async fn deprecated_runtime_still_deploys() {
        let platform = Arc::new(FakePlatform::default());
        platform.state().runtimes = vec![RuntimeDescriptor::new(
            "node14",
            "Node",
            RuntimeStatus::EndOfSupport,
        )];
        let ns = platform.seed_namespace("shop");

        let decl = FunctionDecl {
            runtime: Some("node14".to_string()),
            ..function("old")
        };
        function_reconciler(&platform)
            .reconcile(&ns, &[decl])
            .await
            .unwrap();

        assert_eq!(platform.state().function_creates[0].spec.runtime, "node14");
    }
}
