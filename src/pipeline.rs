//! Deploy pipeline
//!
//! Stages run strictly in order and the first fatal error aborts the rest:
//!
//! 1. validate the manifest and credentials
//! 2. ensure the namespace is ready
//! 3. containers: reconcile, build and push images, let the registry settle,
//!    deploy, wait until ready
//! 4. functions: reconcile, upload the archive, deploy, wait until ready
//! 5. replace cron triggers, functions first
//!
//! Each stage receives the [`DeployContext`] built by the previous ones and
//! returns a new one; nothing is mutated in place. A kind that declares
//! nothing is skipped entirely.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use stratus_api::ApiClient;
use stratus_common::manifest::{EventDecl, ServiceManifest};
use stratus_common::model::{
    Container, CronTrigger, Function, Namespace, RemoteResource, ResourceRef,
};
use stratus_common::Result;

use crate::client::{CodeUploadApi, DomainApi, NamespaceApi, ResourceApi, RuntimeApi, TriggerApi};
use crate::config::DeploySettings;
use crate::image::ImageBuilder;
use crate::kind::{registry_image, Containers, DeclaredResource, Functions, ResourceKind};
use crate::reconcile::{
    settle_all, wait_until_ready, Cleanup, DomainReconciler, NamespaceReconciler,
    ReconciledResource, ResourceReconciler, SecretDiffer, TriggerReconciler,
};
use crate::upload::{CodeUploader, UploadTarget};
use crate::validate::validate;

// =============================================================================
// Collaborators
// =============================================================================

/// Every remote capability the pipeline needs
#[derive(Clone)]
pub struct Collaborators {
    /// Namespace lifecycle
    pub namespaces: Arc<dyn NamespaceApi>,
    /// Function CRUD and deploy
    pub functions: Arc<dyn ResourceApi<Functions>>,
    /// Container CRUD and deploy
    pub containers: Arc<dyn ResourceApi<Containers>>,
    /// Runtime catalog
    pub runtimes: Arc<dyn RuntimeApi>,
    /// Cron triggers
    pub triggers: Arc<dyn TriggerApi>,
    /// Custom domains
    pub domains: Arc<dyn DomainApi>,
    /// Function archive upload
    pub uploads: Arc<dyn CodeUploadApi>,
    /// Container image build and push
    pub images: Arc<dyn ImageBuilder>,
}

impl Collaborators {
    /// Wire every platform capability to one HTTP client
    pub fn from_client(client: Arc<ApiClient>, images: Arc<dyn ImageBuilder>) -> Self {
        Self {
            namespaces: client.clone(),
            functions: client.clone(),
            containers: client.clone(),
            runtimes: client.clone(),
            triggers: client.clone(),
            domains: client.clone(),
            uploads: client,
            images,
        }
    }
}

// =============================================================================
// Context and report
// =============================================================================

/// State handed from one stage to the next
#[derive(Clone, Debug)]
pub struct DeployContext {
    namespace: Namespace,
    containers: Vec<ReconciledResource<Containers>>,
    functions: Vec<ReconciledResource<Functions>>,
    ready_containers: Vec<Container>,
    ready_functions: Vec<Function>,
}

impl DeployContext {
    /// Context once the namespace is ready
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            containers: Vec::new(),
            functions: Vec::new(),
            ready_containers: Vec::new(),
            ready_functions: Vec::new(),
        }
    }

    /// Context after the container stage
    pub fn with_containers(
        self,
        reconciled: Vec<ReconciledResource<Containers>>,
        ready: Vec<Container>,
    ) -> Self {
        Self {
            containers: reconciled,
            ready_containers: ready,
            ..self
        }
    }

    /// Context after the function stage
    pub fn with_functions(
        self,
        reconciled: Vec<ReconciledResource<Functions>>,
        ready: Vec<Function>,
    ) -> Self {
        Self {
            functions: reconciled,
            ready_functions: ready,
            ..self
        }
    }

    /// The service namespace
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Trigger targets, functions first
    fn trigger_targets(&self) -> Vec<(ResourceRef, String, Vec<EventDecl>)> {
        let functions = self.functions.iter().map(trigger_target);
        let containers = self.containers.iter().map(trigger_target);
        functions.chain(containers).collect()
    }
}

fn trigger_target<K: ResourceKind>(
    resource: &ReconciledResource<K>,
) -> (ResourceRef, String, Vec<EventDecl>) {
    (
        resource.resource_ref(),
        resource.declared.name().to_string(),
        resource.declared.events().to_vec(),
    )
}

/// Outcome of a successful deploy
#[derive(Clone, Debug)]
pub struct DeployReport {
    /// The service namespace
    pub namespace: Namespace,
    /// Every function of the namespace, all ready
    pub functions: Vec<Function>,
    /// Every container of the namespace, all ready
    pub containers: Vec<Container>,
    /// Triggers created in this run
    pub triggers: Vec<CronTrigger>,
    /// Undeclared resources deleted in single-source mode
    pub orphans_removed: usize,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Deploys a service manifest
pub struct Pipeline {
    collaborators: Collaborators,
    settings: DeploySettings,
    secrets: SecretDiffer,
}

impl Pipeline {
    /// Pipeline resolving secret references from the process environment
    pub fn new(collaborators: Collaborators, settings: DeploySettings) -> Self {
        Self {
            collaborators,
            settings,
            secrets: SecretDiffer::from_process_env(),
        }
    }

    /// Override the secret differ
    pub fn with_secrets(mut self, secrets: SecretDiffer) -> Self {
        self.secrets = secrets;
        self
    }

    /// Run every stage against `manifest`
    #[instrument(skip_all, fields(service = %manifest.service))]
    pub async fn deploy(&self, manifest: &ServiceManifest) -> Result<DeployReport> {
        validate(manifest, &self.settings.credentials)?;

        let namespace = NamespaceReconciler::new(
            self.collaborators.namespaces.clone(),
            self.secrets.clone(),
        )
        .with_policy(self.settings.polls.namespace.clone())
        .ensure(
            &manifest.service,
            &manifest.namespace_env(),
            &manifest.provider.secret,
        )
        .await?;

        let mut cleanup = Cleanup::default();
        let context = DeployContext::new(namespace);
        let context = self.deploy_containers(context, manifest, &mut cleanup).await?;
        let context = self.deploy_functions(context, manifest, &mut cleanup).await?;

        let triggers = TriggerReconciler::new(self.collaborators.triggers.clone())
            .reconcile_all(&context.trigger_targets())
            .await?;

        let orphans_removed = cleanup.len();
        cleanup.settle().await;

        for function in &context.ready_functions {
            info!(
                function = %function.name(),
                endpoint = %function.domain_name(),
                "Function is ready"
            );
        }
        for container in &context.ready_containers {
            info!(
                container = %container.name(),
                endpoint = %container.domain_name(),
                "Container is ready"
            );
        }

        Ok(DeployReport {
            namespace: context.namespace,
            functions: context.ready_functions,
            containers: context.ready_containers,
            triggers,
            orphans_removed,
        })
    }

    fn reconciler<K: ResourceKind>(
        &self,
        api: Arc<dyn ResourceApi<K>>,
        manifest: &ServiceManifest,
    ) -> ResourceReconciler<K> {
        ResourceReconciler::new(
            api,
            self.collaborators.runtimes.clone(),
            DomainReconciler::new(self.collaborators.domains.clone()),
            self.secrets.clone(),
        )
        .with_single_source(self.settings.single_source(manifest))
        .with_policies(
            self.settings.polls.namespace.clone(),
            self.settings.polls.delete.clone(),
        )
    }

    #[instrument(skip_all)]
    async fn deploy_containers(
        &self,
        context: DeployContext,
        manifest: &ServiceManifest,
        cleanup: &mut Cleanup,
    ) -> Result<DeployContext> {
        let declared = manifest.container_decls();
        if declared.is_empty() {
            return Ok(context);
        }

        let api = self.collaborators.containers.clone();
        let reconciled = self
            .reconciler(api.clone(), manifest)
            .reconcile(context.namespace(), &declared)
            .await?;
        cleanup.extend(reconciled.cleanup);

        self.build_images(&reconciled.resources, context.namespace(), manifest)
            .await?;

        info!(count = reconciled.resources.len(), "Deploying containers");
        deploy_all(api.as_ref(), &reconciled.resources).await?;
        let ready = wait_until_ready(
            api.as_ref(),
            &context.namespace().id,
            &self.settings.polls.deploy,
        )
        .await?;

        Ok(context.with_containers(reconciled.resources, ready))
    }

    async fn build_images(
        &self,
        containers: &[ReconciledResource<Containers>],
        namespace: &Namespace,
        manifest: &ServiceManifest,
    ) -> Result<()> {
        let builds: Vec<_> = containers
            .iter()
            .filter_map(|c| c.declared.directory.as_ref().map(|dir| (c, dir)))
            .collect();
        if builds.is_empty() {
            return Ok(());
        }

        let images = &self.collaborators.images;
        images.login().await?;
        for (container, directory) in builds {
            let image = registry_image(&container.declared, namespace);
            images
                .build_and_push(
                    &manifest.base_dir.join(directory),
                    &image,
                    &container.declared.build_args,
                )
                .await?;
        }

        info!(
            delay_secs = self.settings.polls.registry_settle.as_secs(),
            "Waiting for the registry to serve the pushed images"
        );
        tokio::time::sleep(self.settings.polls.registry_settle).await;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deploy_functions(
        &self,
        context: DeployContext,
        manifest: &ServiceManifest,
        cleanup: &mut Cleanup,
    ) -> Result<DeployContext> {
        let declared = manifest.function_decls();
        if declared.is_empty() {
            return Ok(context);
        }

        let api = self.collaborators.functions.clone();
        let reconciled = self
            .reconciler(api.clone(), manifest)
            .with_default_runtime(manifest.provider.runtime.clone())
            .reconcile(context.namespace(), &declared)
            .await?;
        cleanup.extend(reconciled.cleanup);

        match &self.settings.archive {
            Some(archive) => {
                let targets: Vec<UploadTarget> = reconciled
                    .resources
                    .iter()
                    .map(|f| UploadTarget {
                        id: f.remote.id().to_string(),
                        name: f.remote.name().to_string(),
                    })
                    .collect();
                CodeUploader::new(self.collaborators.uploads.clone())
                    .upload_all(archive, &targets)
                    .await?;
            }
            None => warn!("No code archive given; functions are deployed with their current code"),
        }

        info!(count = reconciled.resources.len(), "Deploying functions");
        deploy_all(api.as_ref(), &reconciled.resources).await?;
        let ready = wait_until_ready(
            api.as_ref(),
            &context.namespace().id,
            &self.settings.polls.deploy,
        )
        .await?;

        Ok(context.with_functions(reconciled.resources, ready))
    }
}

/// Issue every deploy call before anyone waits on the rollout
async fn deploy_all<K: ResourceKind>(
    api: &dyn ResourceApi<K>,
    resources: &[ReconciledResource<K>],
) -> Result<()> {
    settle_all(
        "Deploy",
        resources
            .iter()
            .map(|r| (r.remote.name(), api.deploy(r.remote.id()))),
    )
    .await?;
    Ok(())
}
