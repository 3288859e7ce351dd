//! Triggers, runtimes, domains and tokens

use serde::{Deserialize, Serialize};

use super::{Kind, Status};

/// A cron trigger bound to a function or container
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CronTrigger {
    /// Platform-assigned id
    pub id: String,
    /// Owning function, when bound to a function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<String>,
    /// Owning container, when bound to a container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Five-field cron expression
    pub schedule: String,
    /// JSON body sent on each invocation
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Body of a cron creation call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateCronRequest {
    /// Owner of the trigger
    #[serde(flatten)]
    pub owner: ResourceRef,
    /// Five-field cron expression
    pub schedule: String,
    /// JSON body sent on each invocation, `{}` when none is declared
    pub args: serde_json::Value,
}

/// A function or container, addressed by id
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Kind of the resource
    pub kind: Kind,
    /// Platform id
    pub id: String,
}

impl ResourceRef {
    /// Reference a function
    pub fn function(id: impl Into<String>) -> Self {
        Self {
            kind: Kind::Function,
            id: id.into(),
        }
    }

    /// Reference a container
    pub fn container(id: impl Into<String>) -> Self {
        Self {
            kind: Kind::Container,
            id: id.into(),
        }
    }
}

// The platform keys owners as `function_id` or `container_id`
impl Serialize for ResourceRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.owner_field(), &self.id)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResourceRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            function_id: Option<String>,
            container_id: Option<String>,
        }
        let raw = Raw::deserialize(deserializer)?;
        match (raw.function_id, raw.container_id) {
            (Some(id), None) => Ok(ResourceRef::function(id)),
            (None, Some(id)) => Ok(ResourceRef::container(id)),
            _ => Err(serde::de::Error::custom(
                "expected exactly one of function_id or container_id",
            )),
        }
    }
}

/// Lifecycle status of a runtime in the platform catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeStatus {
    /// Fully supported
    Available,
    /// No new functions may use it; existing ones can still be updated
    EndOfSupport,
    /// Existing functions keep running but can no longer be updated
    EndOfLife,
    /// Beta, deprecated, or anything else the platform reports
    Other(String),
}

impl From<String> for RuntimeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "available" => RuntimeStatus::Available,
            "end_of_support" => RuntimeStatus::EndOfSupport,
            "end_of_life" => RuntimeStatus::EndOfLife,
            _ => RuntimeStatus::Other(s),
        }
    }
}

impl From<RuntimeStatus> for String {
    fn from(s: RuntimeStatus) -> Self {
        s.to_string()
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeStatus::Available => f.write_str("available"),
            RuntimeStatus::EndOfSupport => f.write_str("end_of_support"),
            RuntimeStatus::EndOfLife => f.write_str("end_of_life"),
            RuntimeStatus::Other(s) => f.write_str(s),
        }
    }
}

/// One entry of the runtime catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    /// Runtime identifier, e.g. `python311`
    pub name: String,
    /// Language family, used only to group the catalog for display
    #[serde(default)]
    pub language: String,
    /// Lifecycle status
    pub status: RuntimeStatus,
    /// Extra context from the platform
    #[serde(default)]
    pub status_message: Option<String>,
}

impl RuntimeDescriptor {
    /// Catalog entry with no status message
    pub fn new(name: impl Into<String>, language: impl Into<String>, status: RuntimeStatus) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            status,
            status_message: None,
        }
    }
}

/// A custom hostname bound to a function or container
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Platform-assigned id
    pub id: String,
    /// Bound hostname
    pub hostname: String,
    /// Binding status
    #[serde(default)]
    pub status: Status,
    /// Present when `status` is `error`
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of a domain creation call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateDomainRequest {
    /// Resource the hostname is routed to
    #[serde(flatten)]
    pub owner: ResourceRef,
    /// Hostname, which must already CNAME to the resource endpoint
    pub hostname: String,
}

/// An access token issued by the platform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Bearer token value
    pub token: String,
}

/// One log line of a function or container, as returned newest first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Platform-assigned id
    #[serde(default)]
    pub id: String,
    /// Log text
    pub message: String,
    /// RFC 3339 emission time
    #[serde(default)]
    pub timestamp: Option<String>,
    /// `stdout`, `stderr` or a platform source
    #[serde(default)]
    pub stream: Option<String>,
}
