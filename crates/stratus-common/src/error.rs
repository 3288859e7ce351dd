//! Error types for stratus
//!
//! Errors are structured with fields so that a failed deploy can be traced
//! back to the resource that caused it. Remote diagnostics are carried
//! verbatim so the user sees exactly what the platform reported.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for stratus operations
#[derive(Debug, Error)]
pub enum Error {
    /// The local declaration is invalid. Every problem found is reported at once.
    #[error("{}", .messages.join("\n"))]
    Validation {
        /// One entry per problem, in the order they were detected
        messages: Vec<String>,
    },

    /// A namespace or resource reports `status: error`
    #[error("{kind} {name} is in error state: {message}")]
    RemoteState {
        /// Resource kind (namespace, function, container)
        kind: String,
        /// Resource name
        name: String,
        /// The platform's error_message, verbatim
        message: String,
    },

    /// A named object a command operates on does not exist
    #[error("{kind} {name} does not exist")]
    NotFound {
        /// Object kind (namespace, function, container)
        kind: String,
        /// Object name
        name: String,
    },

    /// A remote call failed at the HTTP or network level
    #[error("{message}")]
    Transport {
        /// HTTP status code, absent for network failures
        status: Option<u16>,
        /// Parsed server message, or the raw transport error
        message: String,
    },

    /// The requested runtime is unknown, or the catalog could not be listed
    #[error("{message}")]
    UnknownRuntime {
        /// Full diagnostic, including the list of known runtimes
        message: String,
    },

    /// Building or pushing a container image failed
    #[error("image build failed for {image}: {message}")]
    ImageBuild {
        /// Image tag being built
        image: String,
        /// Description of what failed
        message: String,
    },

    /// Uploading a function archive failed
    #[error("code upload failed for {function}: {message}")]
    Upload {
        /// Function receiving the archive
        function: String,
        /// Description of what failed
        message: String,
    },

    /// A bounded wait gave up
    #[error("timed out waiting for {what} after {attempts} attempts")]
    Timeout {
        /// Description of what was being waited on
        what: String,
        /// Number of polls issued before giving up
        attempts: u32,
    },

    /// Filesystem error
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: String,
        /// The underlying io error
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// What was being (de)serialized, if known
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "cleanup", "pipeline")
        context: String,
    },
}

impl Error {
    /// Create a validation error with a single message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![msg.into()],
        }
    }

    /// Create a validation error from an aggregated list of problems
    pub fn validation_all(messages: Vec<String>) -> Self {
        Self::Validation { messages }
    }

    /// Create a remote-state error for a resource reporting `error`
    pub fn remote_state(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::RemoteState {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a transport error carrying an HTTP status
    pub fn transport(status: u16, msg: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Create a transport error for a failure below HTTP (DNS, TLS, connect)
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: msg.into(),
        }
    }

    /// Create an unknown-runtime error
    pub fn unknown_runtime(msg: impl Into<String>) -> Self {
        Self::UnknownRuntime {
            message: msg.into(),
        }
    }

    /// Create an image build error
    pub fn image_build(image: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ImageBuild {
            image: image.into(),
            message: msg.into(),
        }
    }

    /// Create an upload error
    pub fn upload(function: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Upload {
            function: function.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, attempts: u32) -> Self {
        Self::Timeout {
            what: what.into(),
            attempts,
        }
    }

    /// Create an io error bound to a path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with the kind being processed
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Returns true if retrying the same call might succeed
    ///
    /// Network failures, throttling and 5xx responses are transient. Anything
    /// that reflects the declaration or the platform's view of a resource is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { status: None, .. } => true,
            Error::Transport {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Error::Upload { .. } => true,
            Error::Io { .. } => false,
            Error::Validation { .. }
            | Error::RemoteState { .. }
            | Error::NotFound { .. }
            | Error::UnknownRuntime { .. }
            | Error::ImageBuild { .. }
            | Error::Timeout { .. }
            | Error::Serialization { .. }
            | Error::Internal { .. } => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization_for("json", e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::serialization_for("yaml", e.to_string())
    }
}
