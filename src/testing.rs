//! In-memory platform for multi-step tests
//!
//! Implements every collaborator trait over a single locked state. Creates
//! land in `created`, deploys go straight to `ready`, deletions are
//! immediate. Secrets are stored as real argon2 hashes so the differ sees
//! what it would see against the real platform.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stratus_api::UploadUrl;
use stratus_common::model::{
    AccessToken, Container, ContainerSpec, CreateCronRequest, CreateDomainRequest,
    CreateNamespaceRequest, CreateRequest, CronTrigger, Domain, Function, FunctionSpec,
    HashedSecret, Kind, LogLine, Namespace, ResourceRef, RuntimeDescriptor, RuntimeStatus,
    SecretEnvVar, Status, UpdateNamespaceRequest, UpdateRequest,
};
use stratus_common::{Error, Result};

use crate::client::{
    CodeUploadApi, DomainApi, LogsApi, NamespaceApi, ResourceApi, RuntimeApi, TokenApi,
    TriggerApi,
};
use crate::kind::{Containers, Functions};
use crate::reconcile::secrets::hash_secret;

/// Everything the fake platform stores or records
#[derive(Default)]
pub(crate) struct PlatformState {
    pub namespaces: Vec<Namespace>,
    pub functions: Vec<Function>,
    pub containers: Vec<Container>,
    pub crons: Vec<CronTrigger>,
    pub domains: Vec<(ResourceRef, Domain)>,
    /// Log lines per resource, newest first as the platform returns them
    pub logs: Vec<(ResourceRef, LogLine)>,
    pub runtimes: Vec<RuntimeDescriptor>,
    pub fail_runtimes: bool,

    pub function_creates: Vec<CreateRequest<FunctionSpec>>,
    pub function_updates: Vec<(String, UpdateRequest<FunctionSpec>)>,
    pub container_creates: Vec<CreateRequest<ContainerSpec>>,
    pub container_updates: Vec<(String, UpdateRequest<ContainerSpec>)>,
    pub deploys: Vec<String>,
    pub deleted: Vec<String>,
    pub uploads: Vec<(String, usize)>,
    pub tokens: Vec<String>,

    /// Remaining `get` calls before a resource turns ready
    ripening: HashMap<String, u32>,
    next_id: u32,
}

impl PlatformState {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn ripen(&mut self, id: &str) -> bool {
        match self.ripening.get_mut(id) {
            Some(left) => {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    self.ripening.remove(id);
                    return true;
                }
                false
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    /// Platform advertising node22 and python311
    pub fn with_node_runtimes() -> Self {
        let platform = Self::default();
        platform.state().runtimes = vec![
            RuntimeDescriptor::new("node22", "Node", RuntimeStatus::Available),
            RuntimeDescriptor::new("python311", "Python", RuntimeStatus::Available),
        ];
        platform
    }

    pub fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap()
    }

    /// A ready namespace
    pub fn seed_namespace(&self, name: &str) -> Namespace {
        let mut state = self.state();
        let ns = Namespace {
            id: state.new_id("ns"),
            name: name.to_string(),
            status: Status::Ready,
            registry_endpoint: format!("rg.fr-par.scw.cloud/funcscw{name}"),
            ..Default::default()
        };
        state.namespaces.push(ns.clone());
        ns
    }

    pub fn seed_function(&self, namespace_id: &str, name: &str, status: Status) -> String {
        let mut state = self.state();
        let id = state.new_id("fn");
        state.functions.push(Function {
            id: id.clone(),
            name: name.to_string(),
            namespace_id: namespace_id.to_string(),
            status,
            runtime: "node22".to_string(),
            ..Default::default()
        });
        id
    }

    pub fn seed_container(&self, namespace_id: &str, name: &str, status: Status) -> String {
        let mut state = self.state();
        let id = state.new_id("ct");
        state.containers.push(Container {
            id: id.clone(),
            name: name.to_string(),
            namespace_id: namespace_id.to_string(),
            status,
            ..Default::default()
        });
        id
    }

    /// Make the resource `id` turn ready on its `gets`-th `get`
    pub fn ripen_after(&self, id: &str, gets: u32) {
        self.state().ripening.insert(id.to_string(), gets);
    }
}

fn hashed(secrets: &[SecretEnvVar]) -> Vec<HashedSecret> {
    let mut stored = Vec::new();
    apply_secrets(&mut stored, secrets);
    stored
}

fn apply_secrets(stored: &mut Vec<HashedSecret>, mutations: &[SecretEnvVar]) {
    for m in mutations {
        stored.retain(|s| s.key != m.key);
        if let Some(value) = &m.value {
            stored.push(HashedSecret {
                key: m.key.clone(),
                hashed_value: hash_secret(value),
            });
        }
    }
}

fn not_found(what: &str) -> Error {
    Error::transport(404, format!("{what} is not found"))
}

#[async_trait]
impl NamespaceApi for FakePlatform {
    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.state().namespaces.iter().find(|n| n.name == name).cloned())
    }

    async fn get_namespace(&self, id: &str) -> Result<Option<Namespace>> {
        Ok(self.state().namespaces.iter().find(|n| n.id == id).cloned())
    }

    async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<Namespace> {
        let mut state = self.state();
        let ns = Namespace {
            id: state.new_id("ns"),
            name: request.name.clone(),
            status: Status::Ready,
            environment_variables: request.environment_variables.clone(),
            secret_environment_variables: hashed(&request.secret_environment_variables),
            registry_endpoint: format!("rg.fr-par.scw.cloud/funcscw{}", request.name),
            error_message: None,
        };
        state.namespaces.push(ns.clone());
        Ok(ns)
    }

    async fn update_namespace(
        &self,
        id: &str,
        request: &UpdateNamespaceRequest,
    ) -> Result<Namespace> {
        let mut state = self.state();
        let ns = state
            .namespaces
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("namespace"))?;
        if let Some(env) = &request.environment_variables {
            ns.environment_variables = env.clone();
        }
        if let Some(secrets) = &request.secret_environment_variables {
            apply_secrets(&mut ns.secret_environment_variables, secrets);
        }
        Ok(ns.clone())
    }

    async fn delete_namespace(&self, id: &str) -> Result<Namespace> {
        let mut state = self.state();
        let pos = state
            .namespaces
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| not_found("namespace"))?;
        let mut ns = state.namespaces.remove(pos);
        state.functions.retain(|f| f.namespace_id != id);
        state.containers.retain(|c| c.namespace_id != id);
        state.deleted.push(ns.id.clone());
        ns.status = Status::Deleting;
        Ok(ns)
    }
}

#[async_trait]
impl ResourceApi<Functions> for FakePlatform {
    async fn list(&self, namespace_id: &str) -> Result<Vec<Function>> {
        Ok(self
            .state()
            .functions
            .iter()
            .filter(|f| f.namespace_id == namespace_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Function>> {
        let mut state = self.state();
        let ripe = state.ripen(id);
        let found = state.functions.iter_mut().find(|f| f.id == id);
        Ok(found.map(|f| {
            if ripe {
                f.status = Status::Ready;
            }
            f.clone()
        }))
    }

    async fn create(&self, request: &CreateRequest<FunctionSpec>) -> Result<Function> {
        let mut state = self.state();
        state.function_creates.push(request.clone());
        let spec = &request.spec;
        let f = Function {
            id: state.new_id("fn"),
            name: request.name.clone(),
            namespace_id: request.namespace_id.clone(),
            status: Status::Created,
            error_message: None,
            runtime: spec.runtime.clone(),
            handler: spec.handler.clone(),
            privacy: spec.privacy.unwrap_or_default(),
            domain_name: format!("{}.functions.fnc.fr-par.scw.cloud", request.name),
            environment_variables: spec.environment_variables.clone(),
            secret_environment_variables: hashed(&spec.secret_environment_variables),
        };
        state.functions.push(f.clone());
        Ok(f)
    }

    async fn update(&self, id: &str, request: &UpdateRequest<FunctionSpec>) -> Result<Function> {
        let mut state = self.state();
        state.function_updates.push((id.to_string(), request.clone()));
        let spec = &request.spec;
        let f = state
            .functions
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("function"))?;
        f.runtime = spec.runtime.clone();
        f.handler = spec.handler.clone();
        f.privacy = spec.privacy.unwrap_or_default();
        f.environment_variables = spec.environment_variables.clone();
        apply_secrets(&mut f.secret_environment_variables, &spec.secret_environment_variables);
        Ok(f.clone())
    }

    async fn delete(&self, id: &str) -> Result<Function> {
        let mut state = self.state();
        let pos = state
            .functions
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| not_found("function"))?;
        let mut f = state.functions.remove(pos);
        state.deleted.push(f.id.clone());
        f.status = Status::Deleting;
        Ok(f)
    }

    async fn deploy(&self, id: &str) -> Result<Function> {
        let mut state = self.state();
        state.deploys.push(id.to_string());
        let f = state
            .functions
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("function"))?;
        f.status = Status::Ready;
        Ok(f.clone())
    }
}

#[async_trait]
impl ResourceApi<Containers> for FakePlatform {
    async fn list(&self, namespace_id: &str) -> Result<Vec<Container>> {
        Ok(self
            .state()
            .containers
            .iter()
            .filter(|c| c.namespace_id == namespace_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Container>> {
        let mut state = self.state();
        let ripe = state.ripen(id);
        let found = state.containers.iter_mut().find(|c| c.id == id);
        Ok(found.map(|c| {
            if ripe {
                c.status = Status::Ready;
            }
            c.clone()
        }))
    }

    async fn create(&self, request: &CreateRequest<ContainerSpec>) -> Result<Container> {
        let mut state = self.state();
        state.container_creates.push(request.clone());
        let spec = &request.spec;
        let c = Container {
            id: state.new_id("ct"),
            name: request.name.clone(),
            namespace_id: request.namespace_id.clone(),
            status: Status::Created,
            error_message: None,
            registry_image: spec.registry_image.clone(),
            privacy: spec.privacy.unwrap_or_default(),
            domain_name: format!("{}.containers.fnc.fr-par.scw.cloud", request.name),
            private_network_id: spec.private_network_id.clone().filter(|id| !id.is_empty()),
            environment_variables: spec.environment_variables.clone(),
            secret_environment_variables: hashed(&spec.secret_environment_variables),
        };
        state.containers.push(c.clone());
        Ok(c)
    }

    async fn update(&self, id: &str, request: &UpdateRequest<ContainerSpec>) -> Result<Container> {
        let mut state = self.state();
        state.container_updates.push((id.to_string(), request.clone()));
        let spec = &request.spec;
        let c = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("container"))?;
        c.registry_image = spec.registry_image.clone();
        c.privacy = spec.privacy.unwrap_or_default();
        c.environment_variables = spec.environment_variables.clone();
        if let Some(network) = &spec.private_network_id {
            c.private_network_id = Some(network.clone()).filter(|id| !id.is_empty());
        }
        apply_secrets(&mut c.secret_environment_variables, &spec.secret_environment_variables);
        Ok(c.clone())
    }

    async fn delete(&self, id: &str) -> Result<Container> {
        let mut state = self.state();
        let pos = state
            .containers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| not_found("container"))?;
        let mut c = state.containers.remove(pos);
        state.deleted.push(c.id.clone());
        c.status = Status::Deleting;
        Ok(c)
    }

    async fn deploy(&self, id: &str) -> Result<Container> {
        let mut state = self.state();
        state.deploys.push(id.to_string());
        let c = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("container"))?;
        c.status = Status::Ready;
        Ok(c.clone())
    }
}

#[async_trait]
impl RuntimeApi for FakePlatform {
    async fn list_runtimes(&self) -> Result<Vec<RuntimeDescriptor>> {
        let state = self.state();
        if state.fail_runtimes {
            return Err(Error::transport(503, "service unavailable"));
        }
        Ok(state.runtimes.clone())
    }
}

fn owned_by(trigger: &CronTrigger, owner: &ResourceRef) -> bool {
    let id = match owner.kind {
        Kind::Function => &trigger.function_id,
        Kind::Container => &trigger.container_id,
    };
    id.as_deref() == Some(owner.id.as_str())
}

#[async_trait]
impl TriggerApi for FakePlatform {
    async fn list_triggers(&self, owner: &ResourceRef) -> Result<Vec<CronTrigger>> {
        Ok(self
            .state()
            .crons
            .iter()
            .filter(|t| owned_by(t, owner))
            .cloned()
            .collect())
    }

    async fn create_trigger(&self, request: &CreateCronRequest) -> Result<CronTrigger> {
        let mut state = self.state();
        let (function_id, container_id) = match request.owner.kind {
            Kind::Function => (Some(request.owner.id.clone()), None),
            Kind::Container => (None, Some(request.owner.id.clone())),
        };
        let trigger = CronTrigger {
            id: state.new_id("cron"),
            function_id,
            container_id,
            schedule: request.schedule.clone(),
            args: request.args.clone(),
        };
        state.crons.push(trigger.clone());
        Ok(trigger)
    }

    async fn delete_trigger(&self, _kind: Kind, id: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.crons.len();
        state.crons.retain(|t| t.id != id);
        if state.crons.len() == before {
            return Err(not_found("cron"));
        }
        Ok(())
    }
}

#[async_trait]
impl DomainApi for FakePlatform {
    async fn list_domains(&self, owner: &ResourceRef) -> Result<Vec<Domain>> {
        Ok(self
            .state()
            .domains
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<Domain> {
        let mut state = self.state();
        let domain = Domain {
            id: state.new_id("dom"),
            hostname: request.hostname.clone(),
            status: Status::Pending,
            error_message: None,
        };
        state.domains.push((request.owner.clone(), domain.clone()));
        Ok(domain)
    }

    async fn delete_domain(&self, _kind: Kind, id: &str) -> Result<Domain> {
        let mut state = self.state();
        let pos = state
            .domains
            .iter()
            .position(|(_, d)| d.id == id)
            .ok_or_else(|| not_found("domain"))?;
        Ok(state.domains.remove(pos).1)
    }
}

#[async_trait]
impl LogsApi for FakePlatform {
    async fn list_logs(&self, owner: &ResourceRef) -> Result<Vec<LogLine>> {
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, line)| line.clone())
            .collect())
    }
}

#[async_trait]
impl TokenApi for FakePlatform {
    async fn issue_namespace_token(
        &self,
        namespace_id: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        self.state().tokens.push(namespace_id.to_string());
        Ok(AccessToken {
            token: format!("token-{namespace_id}"),
        })
    }

    async fn issue_resource_token(
        &self,
        owner: &ResourceRef,
        _expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        self.state().tokens.push(owner.id.clone());
        Ok(AccessToken {
            token: format!("token-{}", owner.id),
        })
    }
}

#[async_trait]
impl CodeUploadApi for FakePlatform {
    async fn upload_url(&self, function_id: &str, _content_length: u64) -> Result<UploadUrl> {
        Ok(UploadUrl {
            url: format!("https://s3.fr-par.scw.cloud/uploads/{function_id}.zip"),
            headers: Default::default(),
        })
    }

    async fn put_archive(&self, target: &UploadUrl, archive: Vec<u8>) -> Result<()> {
        self.state().uploads.push((target.url.clone(), archive.len()));
        Ok(())
    }
}
