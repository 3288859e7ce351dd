//! Container wire types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{HashedSecret, Privacy, RemoteResource, SecretEnvVar, Status};

/// A container as returned by the platform
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Platform-assigned id
    pub id: String,
    /// Container name, the join key with the local declaration
    pub name: String,
    /// Owning namespace
    #[serde(default)]
    pub namespace_id: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: Status,
    /// Present when `status` is `error`
    #[serde(default)]
    pub error_message: Option<String>,
    /// Image the platform pulls on deploy
    #[serde(default)]
    pub registry_image: String,
    /// Whether invocations require a token
    #[serde(default)]
    pub privacy: Privacy,
    /// Generated endpoint hostname
    #[serde(default)]
    pub domain_name: String,
    /// Attached private network, if any
    #[serde(default)]
    pub private_network_id: Option<String>,
    /// Plain environment variables
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Secrets, hashed server side
    #[serde(default)]
    pub secret_environment_variables: Vec<HashedSecret>,
}

/// Mutable container fields, shared by create and update bodies
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Plain environment variables
    pub environment_variables: BTreeMap<String, String>,
    /// Secrets: the full list on create, mutations on update
    pub secret_environment_variables: Vec<SecretEnvVar>,
    /// Image to deploy
    pub registry_image: String,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Memory in MB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    /// vCPU in thousandths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<u32>,
    /// Minimum number of instances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    /// Maximum number of instances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    /// Deprecated in favour of `scaling_option`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    /// Request timeout as a duration string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Public or private
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,
    /// Port the image listens on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// `enabled` or `redirected` (HTTPS only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_option: Option<String>,
    /// Sandbox generation, `v1` or `v2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
    /// Liveness probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
    /// Autoscaling trigger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling_option: Option<ScalingOptionSpec>,
    /// Private network; an empty string detaches the current one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,
}

/// Health check as the platform expects it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Consecutive failures before the instance is restarted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    /// Duration string between probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// HTTP probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpProbe>,
    /// TCP probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp: Option<TcpProbe>,
}

/// HTTP GET probe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbe {
    /// Path probed, `/` when not declared
    pub path: String,
}

/// TCP connect probe on the container port
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpProbe {}

/// Autoscaling threshold; exactly one field is set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingOptionSpec {
    /// Concurrent requests per instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_requests_threshold: Option<u32>,
    /// CPU usage percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_threshold: Option<u32>,
    /// Memory usage percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_threshold: Option<u32>,
}

impl RemoteResource for Container {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> &Status {
        &self.status
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn hashed_secrets(&self) -> &[HashedSecret] {
        &self.secret_environment_variables
    }

    fn privacy(&self) -> Privacy {
        self.privacy
    }

    fn domain_name(&self) -> &str {
        &self.domain_name
    }
}
