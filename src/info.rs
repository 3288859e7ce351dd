//! Read-only views of a deployed service: its resources and their logs

use std::sync::Arc;

use tracing::{debug, instrument};

use stratus_common::model::{
    Kind, LogLine, Namespace, Privacy, RemoteResource, ResourceRef, Status,
};
use stratus_common::{Error, Result};

use crate::client::{LogsApi, NamespaceApi, ResourceApi};
use crate::kind::{Containers, Functions};

/// One deployed function or container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSummary {
    /// Function or container
    pub kind: Kind,
    /// Platform id
    pub id: String,
    /// Name
    pub name: String,
    /// Lifecycle status
    pub status: Status,
    /// Public or private
    pub privacy: Privacy,
    /// Generated endpoint hostname
    pub endpoint: String,
    /// Diagnostic when `status` is `error`
    pub error_message: Option<String>,
}

impl ResourceSummary {
    fn of<R: RemoteResource>(kind: Kind, remote: &R) -> Self {
        Self {
            kind,
            id: remote.id().to_string(),
            name: remote.name().to_string(),
            status: remote.status().clone(),
            privacy: remote.privacy(),
            endpoint: remote.domain_name().to_string(),
            error_message: remote.error_message().map(str::to_string),
        }
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind,
            id: self.id.clone(),
        }
    }
}

/// A namespace and everything deployed in it
#[derive(Clone, Debug)]
pub struct ServiceInfo {
    /// The service's namespace
    pub namespace: Namespace,
    /// Functions first, then containers, each in platform order
    pub resources: Vec<ResourceSummary>,
}

/// Reads the state of a deployed service
pub struct Inspector {
    namespaces: Arc<dyn NamespaceApi>,
    functions: Arc<dyn ResourceApi<Functions>>,
    containers: Arc<dyn ResourceApi<Containers>>,
    logs: Arc<dyn LogsApi>,
}

impl Inspector {
    /// Inspector over the given collaborators
    pub fn new(
        namespaces: Arc<dyn NamespaceApi>,
        functions: Arc<dyn ResourceApi<Functions>>,
        containers: Arc<dyn ResourceApi<Containers>>,
        logs: Arc<dyn LogsApi>,
    ) -> Self {
        Self {
            namespaces,
            functions,
            containers,
            logs,
        }
    }

    /// Namespace of `service` with its functions and containers
    #[instrument(skip(self))]
    pub async fn info(&self, service: &str) -> Result<ServiceInfo> {
        let namespace = self
            .namespaces
            .find_namespace(service)
            .await?
            .ok_or_else(|| Error::not_found("namespace", service))?;

        let (functions, containers) = futures::join!(
            self.functions.list(&namespace.id),
            self.containers.list(&namespace.id),
        );
        let (functions, containers) = (functions?, containers?);

        let resources = functions
            .iter()
            .map(|f| ResourceSummary::of(Kind::Function, f))
            .chain(containers.iter().map(|c| ResourceSummary::of(Kind::Container, c)))
            .collect();

        Ok(ServiceInfo {
            namespace,
            resources,
        })
    }

    /// Log lines of the function or container `application`, oldest first
    #[instrument(skip(self))]
    pub async fn logs(&self, service: &str, application: &str) -> Result<Vec<LogLine>> {
        let info = self.info(service).await?;
        let target = info
            .resources
            .iter()
            .find(|r| r.name == application)
            .ok_or_else(|| Error::not_found("application", application))?;

        let mut lines = self.logs.list_logs(&target.resource_ref()).await?;
        debug!(kind = %target.kind, count = lines.len(), "Fetched log lines");
        lines.reverse();
        Ok(lines)
    }
}
