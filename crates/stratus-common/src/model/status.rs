//! Lifecycle status shared by namespaces, functions, containers and domains

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status reported by the platform for any provisioned object.
///
/// Statuses the platform adds later are kept verbatim in [`Status::Other`]
/// and treated as transitional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// Provisioning has not finished
    #[default]
    Pending,
    /// Serving traffic
    Ready,
    /// Provisioning failed; `error_message` explains why
    Error,
    /// Being torn down
    Deleting,
    /// Created but never deployed
    Created,
    /// Locked by the platform (billing, abuse)
    Locked,
    /// Any status this version does not know about
    Other(String),
}

impl Status {
    /// True once the object can be used
    pub fn is_ready(&self) -> bool {
        matches!(self, Status::Ready)
    }

    /// True when the object failed
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error)
    }

    /// True when no rollout is in progress, so the object accepts updates
    pub fn is_final(&self) -> bool {
        matches!(self, Status::Ready | Status::Error | Status::Locked)
    }

    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "pending",
            Status::Ready => "ready",
            Status::Error => "error",
            Status::Deleting => "deleting",
            Status::Created => "created",
            Status::Locked => "locked",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Status::Pending,
            "ready" => Status::Ready,
            "error" => Status::Error,
            "deleting" => Status::Deleting,
            "created" => Status::Created,
            "locked" => Status::Locked,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
