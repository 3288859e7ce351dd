//! Namespace wire types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{HashedSecret, SecretEnvVar, Status};

/// A namespace as returned by the platform
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Platform-assigned id
    pub id: String,
    /// Namespace name, equal to the service name
    pub name: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: Status,
    /// Plain environment variables inherited by every resource
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Secrets, hashed server side
    #[serde(default)]
    pub secret_environment_variables: Vec<HashedSecret>,
    /// Container registry bound to this namespace
    #[serde(default)]
    pub registry_endpoint: String,
    /// Present when `status` is `error`
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of a namespace creation call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    /// Namespace name
    pub name: String,
    /// Plain environment variables
    pub environment_variables: BTreeMap<String, String>,
    /// Full list of secrets, plaintext
    pub secret_environment_variables: Vec<SecretEnvVar>,
}

/// Body of a namespace update call; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateNamespaceRequest {
    /// Replacement set of plain environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<BTreeMap<String, String>>,
    /// Secret mutations; a `null` value deletes the key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_environment_variables: Option<Vec<SecretEnvVar>>,
}

impl UpdateNamespaceRequest {
    /// True when the request would not change anything
    pub fn is_empty(&self) -> bool {
        self.environment_variables.is_none()
            && self
                .secret_environment_variables
                .as_ref()
                .is_none_or(|s| s.is_empty())
    }
}
