//! Wire model for the serverless platform
//!
//! These types mirror the platform's JSON payloads. Fields the platform may
//! omit default to empty values so a sparse response still parses.

mod catalog;
mod container;
mod function;
mod namespace;
mod status;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use catalog::{
    AccessToken, CreateCronRequest, CreateDomainRequest, CronTrigger, Domain, LogLine,
    ResourceRef, RuntimeDescriptor, RuntimeStatus,
};
pub use container::{
    Container, ContainerSpec, HealthCheckSpec, HttpProbe, ScalingOptionSpec, TcpProbe,
};
pub use function::{Function, FunctionSpec};
pub use namespace::{CreateNamespaceRequest, Namespace, UpdateNamespaceRequest};
pub use status::Status;

/// The two deployable resource kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Code uploaded as an archive and run on a managed runtime
    Function,
    /// A container image pulled from the namespace registry
    Container,
}

impl Kind {
    /// Field naming the owner in trigger and domain payloads
    pub fn owner_field(self) -> &'static str {
        match self {
            Kind::Function => "function_id",
            Kind::Container => "container_id",
        }
    }

    /// Lowercase name, as used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::Container => "container",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation access policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Anyone can invoke
    #[default]
    Public,
    /// Invocations need a token
    Private,
}

/// A secret as stored by the platform: only the argon2 PHC hash is visible
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedSecret {
    /// Variable name
    pub key: String,
    /// PHC string, e.g. `$argon2id$v=19$...`
    pub hashed_value: String,
}

/// A secret sent to the platform. `value: None` serializes as `null` and
/// deletes the key on update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEnvVar {
    /// Variable name
    pub key: String,
    /// Plaintext value, or `None` to delete
    pub value: Option<String>,
}

impl SecretEnvVar {
    /// Set `key` to `value`
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Delete `key`
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Accessors shared by remote functions and containers
pub trait RemoteResource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Platform id
    fn id(&self) -> &str;
    /// Name, the join key with the local declaration
    fn name(&self) -> &str;
    /// Lifecycle status
    fn status(&self) -> &Status;
    /// Platform diagnostic when `status` is `error`
    fn error_message(&self) -> Option<&str>;
    /// Hashed secrets currently stored
    fn hashed_secrets(&self) -> &[HashedSecret];
    /// Access policy
    fn privacy(&self) -> Privacy;
    /// Generated endpoint hostname
    fn domain_name(&self) -> &str;
}

/// Body of a create call: identity fields plus the kind's spec
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest<S> {
    /// Resource name
    pub name: String,
    /// Owning namespace
    pub namespace_id: String,
    /// Mutable fields
    #[serde(flatten)]
    pub spec: S,
}

/// Body of an update call. `redeploy` is always false: rollout is an
/// explicit, separate step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest<S> {
    /// Whether the platform should redeploy after applying the update
    pub redeploy: bool,
    /// Mutable fields
    #[serde(flatten)]
    pub spec: S,
}

impl<S> UpdateRequest<S> {
    /// Update without triggering a rollout
    pub fn without_redeploy(spec: S) -> Self {
        Self {
            redeploy: false,
            spec,
        }
    }
}
