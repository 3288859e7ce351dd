//! Collaborator traits for the remote platform
//!
//! The reconcilers only see these traits. [`ApiClient`] implements all of them
//! over HTTP; tests use mocks or the in-memory platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use stratus_api::{ApiClient, UploadUrl};
use stratus_common::model::{
    AccessToken, Container, ContainerSpec, CreateCronRequest, CreateDomainRequest,
    CreateNamespaceRequest, CreateRequest, CronTrigger, Domain, Function, FunctionSpec, Kind,
    LogLine, Namespace, ResourceRef, RuntimeDescriptor, UpdateNamespaceRequest, UpdateRequest,
};
use stratus_common::Result;

use crate::kind::{Containers, Functions, ResourceKind};

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Namespace lifecycle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NamespaceApi: Send + Sync {
    /// Namespace of the project with this exact name
    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    /// Namespace by id; `None` once deleted
    async fn get_namespace(&self, id: &str) -> Result<Option<Namespace>>;

    /// Create a namespace
    async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<Namespace>;

    /// Patch env and secrets
    async fn update_namespace(
        &self,
        id: &str,
        request: &UpdateNamespaceRequest,
    ) -> Result<Namespace>;

    /// Start deleting a namespace
    async fn delete_namespace(&self, id: &str) -> Result<Namespace>;
}

/// CRUD plus deploy for one resource kind
#[async_trait]
pub trait ResourceApi<K: ResourceKind>: Send + Sync {
    /// Every resource of this kind in a namespace
    async fn list(&self, namespace_id: &str) -> Result<Vec<K::Remote>>;

    /// Resource by id; `None` once deleted
    async fn get(&self, id: &str) -> Result<Option<K::Remote>>;

    /// Create a resource
    async fn create(&self, request: &CreateRequest<K::Spec>) -> Result<K::Remote>;

    /// Update a resource; never triggers a rollout
    async fn update(&self, id: &str, request: &UpdateRequest<K::Spec>) -> Result<K::Remote>;

    /// Start deleting a resource
    async fn delete(&self, id: &str) -> Result<K::Remote>;

    /// Roll out the current code or image
    async fn deploy(&self, id: &str) -> Result<K::Remote>;
}

/// Runtime catalog
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Every runtime the platform advertises
    async fn list_runtimes(&self) -> Result<Vec<RuntimeDescriptor>>;
}

/// Cron triggers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TriggerApi: Send + Sync {
    /// Triggers bound to a resource
    async fn list_triggers(&self, owner: &ResourceRef) -> Result<Vec<CronTrigger>>;

    /// Bind a new trigger
    async fn create_trigger(&self, request: &CreateCronRequest) -> Result<CronTrigger>;

    /// Remove a trigger
    async fn delete_trigger(&self, kind: Kind, id: &str) -> Result<()>;
}

/// Custom domains
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DomainApi: Send + Sync {
    /// Hostnames bound to a resource
    async fn list_domains(&self, owner: &ResourceRef) -> Result<Vec<Domain>>;

    /// Bind a hostname
    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<Domain>;

    /// Unbind a hostname
    async fn delete_domain(&self, kind: Kind, id: &str) -> Result<Domain>;
}

/// Access tokens for private resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenApi: Send + Sync {
    /// Token covering a whole namespace
    async fn issue_namespace_token(
        &self,
        namespace_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken>;

    /// Token covering a single function or container
    async fn issue_resource_token(
        &self,
        owner: &ResourceRef,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken>;
}

/// Application logs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogsApi: Send + Sync {
    /// Recent log lines of a function or container, newest first
    async fn list_logs(&self, owner: &ResourceRef) -> Result<Vec<LogLine>>;
}

/// Function archive upload
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CodeUploadApi: Send + Sync {
    /// Presigned URL for an archive of `content_length` bytes
    async fn upload_url(&self, function_id: &str, content_length: u64) -> Result<UploadUrl>;

    /// PUT the archive
    async fn put_archive(&self, target: &UploadUrl, archive: Vec<u8>) -> Result<()>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

#[async_trait]
impl NamespaceApi for ApiClient {
    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        ApiClient::find_namespace(self, name).await
    }

    async fn get_namespace(&self, id: &str) -> Result<Option<Namespace>> {
        ApiClient::get_namespace(self, id).await
    }

    async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<Namespace> {
        ApiClient::create_namespace(self, request).await
    }

    async fn update_namespace(
        &self,
        id: &str,
        request: &UpdateNamespaceRequest,
    ) -> Result<Namespace> {
        ApiClient::update_namespace(self, id, request).await
    }

    async fn delete_namespace(&self, id: &str) -> Result<Namespace> {
        ApiClient::delete_namespace(self, id).await
    }
}

#[async_trait]
impl ResourceApi<Functions> for ApiClient {
    async fn list(&self, namespace_id: &str) -> Result<Vec<Function>> {
        self.list_functions(namespace_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<Function>> {
        self.get_function(id).await
    }

    async fn create(&self, request: &CreateRequest<FunctionSpec>) -> Result<Function> {
        self.create_function(request).await
    }

    async fn update(&self, id: &str, request: &UpdateRequest<FunctionSpec>) -> Result<Function> {
        self.update_function(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<Function> {
        self.delete_function(id).await
    }

    async fn deploy(&self, id: &str) -> Result<Function> {
        self.deploy_function(id).await
    }
}

#[async_trait]
impl ResourceApi<Containers> for ApiClient {
    async fn list(&self, namespace_id: &str) -> Result<Vec<Container>> {
        self.list_containers(namespace_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<Container>> {
        self.get_container(id).await
    }

    async fn create(&self, request: &CreateRequest<ContainerSpec>) -> Result<Container> {
        self.create_container(request).await
    }

    async fn update(&self, id: &str, request: &UpdateRequest<ContainerSpec>) -> Result<Container> {
        self.update_container(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<Container> {
        self.delete_container(id).await
    }

    async fn deploy(&self, id: &str) -> Result<Container> {
        self.deploy_container(id).await
    }
}

#[async_trait]
impl RuntimeApi for ApiClient {
    async fn list_runtimes(&self) -> Result<Vec<RuntimeDescriptor>> {
        ApiClient::list_runtimes(self).await
    }
}

#[async_trait]
impl TriggerApi for ApiClient {
    async fn list_triggers(&self, owner: &ResourceRef) -> Result<Vec<CronTrigger>> {
        self.list_crons(owner).await
    }

    async fn create_trigger(&self, request: &CreateCronRequest) -> Result<CronTrigger> {
        self.create_cron(request).await
    }

    async fn delete_trigger(&self, kind: Kind, id: &str) -> Result<()> {
        self.delete_cron(kind, id).await
    }
}

#[async_trait]
impl DomainApi for ApiClient {
    async fn list_domains(&self, owner: &ResourceRef) -> Result<Vec<Domain>> {
        ApiClient::list_domains(self, owner).await
    }

    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<Domain> {
        ApiClient::create_domain(self, request).await
    }

    async fn delete_domain(&self, kind: Kind, id: &str) -> Result<Domain> {
        ApiClient::delete_domain(self, kind, id).await
    }
}

#[async_trait]
impl TokenApi for ApiClient {
    async fn issue_namespace_token(
        &self,
        namespace_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        ApiClient::issue_namespace_token(self, namespace_id, expires_at).await
    }

    async fn issue_resource_token(
        &self,
        owner: &ResourceRef,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        ApiClient::issue_resource_token(self, owner, expires_at).await
    }
}

#[async_trait]
impl LogsApi for ApiClient {
    async fn list_logs(&self, owner: &ResourceRef) -> Result<Vec<LogLine>> {
        ApiClient::list_logs(self, owner).await
    }
}

#[async_trait]
impl CodeUploadApi for ApiClient {
    async fn upload_url(&self, function_id: &str, content_length: u64) -> Result<UploadUrl> {
        self.function_upload_url(function_id, content_length).await
    }

    async fn put_archive(&self, target: &UploadUrl, archive: Vec<u8>) -> Result<()> {
        ApiClient::put_archive(self, target, archive).await
    }
}
