//! Function and container as instances of one generic resource kind
//!
//! The reconciler, waiter and trigger logic is written once against
//! [`ResourceKind`]. Each kind only says how a declaration becomes a wire spec.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;
use tracing::warn;

use stratus_common::manifest::{
    string_env, ContainerDecl, EventDecl, FunctionDecl, HealthCheckDecl, ScalingOptionDecl,
};
use stratus_common::model::{
    Container, ContainerSpec, Function, FunctionSpec, HealthCheckSpec, HttpProbe, Kind, Namespace,
    RemoteResource, ScalingOptionSpec, SecretEnvVar, TcpProbe,
};
use stratus_common::{Error, Result};

/// Accepted `scalingOption.type` values
pub const SCALING_OPTION_TYPES: &[&str] = &["concurrentRequests", "cpuUsage", "memoryUsage"];

/// What every local declaration exposes to the generic reconcilers
pub trait DeclaredResource: Clone + Debug + Send + Sync + 'static {
    /// Name, the join key with the remote resource
    fn name(&self) -> &str;
    /// Declared secrets, unresolved
    fn secrets(&self) -> &BTreeMap<String, String>;
    /// Hostnames to bind on update
    fn custom_domains(&self) -> &[String];
    /// Declared triggers
    fn events(&self) -> &[EventDecl];
}

impl DeclaredResource for FunctionDecl {
    fn name(&self) -> &str {
        &self.name
    }

    fn secrets(&self) -> &BTreeMap<String, String> {
        &self.secret
    }

    fn custom_domains(&self) -> &[String] {
        &self.custom_domains
    }

    fn events(&self) -> &[EventDecl] {
        &self.events
    }
}

impl DeclaredResource for ContainerDecl {
    fn name(&self) -> &str {
        &self.name
    }

    fn secrets(&self) -> &BTreeMap<String, String> {
        &self.secret
    }

    fn custom_domains(&self) -> &[String] {
        &self.custom_domains
    }

    fn events(&self) -> &[EventDecl] {
        &self.events
    }
}

/// Inputs resolved by the reconciler before a spec is built
pub struct SpecInput<'a, R> {
    /// Namespace the resource lives in
    pub namespace: &'a Namespace,
    /// Full secret list on create, mutations on update
    pub secrets: Vec<SecretEnvVar>,
    /// Validated runtime, for kinds that have one
    pub runtime: Option<String>,
    /// Remote resource being updated
    pub existing: Option<&'a R>,
}

/// A deployable resource kind
pub trait ResourceKind: Send + Sync + 'static {
    /// Kind tag
    const KIND: Kind;

    /// Whether an existing resource must reach a final status before it
    /// accepts an update
    const SETTLE_BEFORE_UPDATE: bool;

    /// Local declaration
    type Declared: DeclaredResource;
    /// Remote representation
    type Remote: RemoteResource;
    /// Mutable fields sent on create and update
    type Spec: Serialize + Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Runtime to validate against the catalog, if the kind has one
    fn runtime(declared: &Self::Declared, default: Option<&str>) -> Option<String>;

    /// Build the wire spec for a declaration
    fn build_spec(
        declared: &Self::Declared,
        input: SpecInput<'_, Self::Remote>,
    ) -> Result<Self::Spec>;
}

/// Function kind marker
#[derive(Debug)]
pub enum Functions {}

/// Container kind marker
#[derive(Debug)]
pub enum Containers {}

impl ResourceKind for Functions {
    const KIND: Kind = Kind::Function;
    const SETTLE_BEFORE_UPDATE: bool = false;

    type Declared = FunctionDecl;
    type Remote = Function;
    type Spec = FunctionSpec;

    fn runtime(declared: &FunctionDecl, default: Option<&str>) -> Option<String> {
        declared
            .runtime
            .clone()
            .or_else(|| default.map(str::to_string))
    }

    fn build_spec(declared: &FunctionDecl, input: SpecInput<'_, Function>) -> Result<FunctionSpec> {
        Ok(FunctionSpec {
            environment_variables: string_env(&declared.env),
            secret_environment_variables: input.secrets,
            runtime: input.runtime.unwrap_or_default(),
            handler: declared.handler.clone(),
            description: declared.description.clone(),
            memory_limit: declared.memory_limit,
            min_scale: declared.min_scale,
            max_scale: declared.max_scale,
            timeout: declared.timeout.as_ref().map(|t| t.to_wire()),
            privacy: declared.privacy,
            domain_name: declared.domain_name.clone(),
            http_option: declared.http_option.clone(),
            sandbox: declared.sandbox.clone(),
        })
    }
}

impl ResourceKind for Containers {
    const KIND: Kind = Kind::Container;
    const SETTLE_BEFORE_UPDATE: bool = true;

    type Declared = ContainerDecl;
    type Remote = Container;
    type Spec = ContainerSpec;

    fn runtime(_declared: &ContainerDecl, _default: Option<&str>) -> Option<String> {
        None
    }

    fn build_spec(
        declared: &ContainerDecl,
        input: SpecInput<'_, Container>,
    ) -> Result<ContainerSpec> {
        if declared.max_concurrency.is_some() {
            warn!(
                container = %declared.name,
                "maxConcurrency is deprecated and has been replaced by scalingOption of type concurrentRequests"
            );
        }

        let detach_network = declared.private_network_id.is_none()
            && input
                .existing
                .and_then(|c| c.private_network_id.as_deref())
                .is_some_and(|id| !id.is_empty());
        let private_network_id = if detach_network {
            Some(String::new())
        } else {
            declared.private_network_id.clone()
        };

        Ok(ContainerSpec {
            environment_variables: string_env(&declared.env),
            secret_environment_variables: input.secrets,
            registry_image: registry_image(declared, input.namespace),
            description: declared.description.clone(),
            memory_limit: declared.memory_limit,
            cpu_limit: declared.cpu_limit,
            min_scale: declared.min_scale,
            max_scale: declared.max_scale,
            max_concurrency: declared.max_concurrency,
            timeout: declared.timeout.as_ref().map(|t| t.to_wire()),
            privacy: declared.privacy,
            port: declared.port,
            http_option: declared.http_option.clone(),
            sandbox: declared.sandbox.clone(),
            health_check: declared.health_check.as_ref().map(health_check_spec),
            scaling_option: declared
                .scaling_option
                .as_ref()
                .map(scaling_option_spec)
                .transpose()?
                .flatten(),
            private_network_id,
        })
    }
}

/// Image deployed for a container: the declared one, or the namespace
/// registry's `<name>:latest`
pub fn registry_image(declared: &ContainerDecl, namespace: &Namespace) -> String {
    declared
        .registry_image
        .clone()
        .unwrap_or_else(|| format!("{}/{}:latest", namespace.registry_endpoint, declared.name))
}

fn health_check_spec(decl: &HealthCheckDecl) -> HealthCheckSpec {
    // httpPath implies an HTTP probe unless a type is given
    let probe = decl
        .probe_type
        .as_deref()
        .unwrap_or(if decl.http_path.is_some() { "http" } else { "tcp" });

    HealthCheckSpec {
        failure_threshold: decl.failure_threshold,
        interval: decl.interval.clone(),
        http: (probe == "http").then(|| HttpProbe {
            path: decl.http_path.clone().unwrap_or_else(|| "/".to_string()),
        }),
        tcp: (probe == "tcp").then_some(TcpProbe {}),
    }
}

fn scaling_option_spec(decl: &ScalingOptionDecl) -> Result<Option<ScalingOptionSpec>> {
    let Some(option_type) = decl.option_type.as_deref() else {
        return Ok(None);
    };
    let mut spec = ScalingOptionSpec::default();
    match option_type {
        "concurrentRequests" => spec.concurrent_requests_threshold = decl.threshold,
        "cpuUsage" => spec.cpu_usage_threshold = decl.threshold,
        "memoryUsage" => spec.memory_usage_threshold = decl.threshold,
        _ => {
            return Err(Error::validation(format!(
                "scalingOption.type must be one of: {}",
                SCALING_OPTION_TYPES.join(", ")
            )))
        }
    }
    Ok(Some(spec))
}
