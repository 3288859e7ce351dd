//! Function wire types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{HashedSecret, Privacy, RemoteResource, SecretEnvVar, Status};

/// A function as returned by the platform
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Platform-assigned id
    pub id: String,
    /// Function name, the join key with the local declaration
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
    /// Runtime identifier, e.g. `node22`
    #[serde(default)]
    pub runtime: String,
    /// Entry point, `path/to/file.export`
    #[serde(default)]
    pub handler: Option<String>,
    /// Whether invocations require a token
    #[serde(default)]
    pub privacy: Privacy,
    /// Generated endpoint hostname
    #[serde(default)]
    pub domain_name: String,
    /// Plain environment variables
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Secrets, hashed server side
    #[serde(default)]
    pub secret_environment_variables: Vec<HashedSecret>,
}

/// Mutable function fields, shared by create and update bodies
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Plain environment variables
    pub environment_variables: BTreeMap<String, String>,
    /// Secrets: the full list on create, mutations on update
    pub secret_environment_variables: Vec<SecretEnvVar>,
    /// Validated runtime identifier
    pub runtime: String,
    /// Entry point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Memory in MB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    /// Minimum number of instances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    /// Maximum number of instances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    /// Invocation timeout as a duration string, e.g. `"300s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Public or private
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,
    /// Requested endpoint hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    /// `enabled` or `redirected` (HTTPS only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_option: Option<String>,
    /// Sandbox generation, `v1` or `v2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

impl RemoteResource for Function {
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
