//! Runtime validation against the platform catalog

use tracing::warn;

use stratus_common::model::{RuntimeDescriptor, RuntimeStatus};
use stratus_common::{Error, Result};

/// A runtime accepted for create or update
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRuntime {
    /// Runtime identifier, as sent to the platform
    pub name: String,
    /// Lifecycle warning, already logged, when the runtime is not `available`
    pub warning: Option<String>,
}

/// Check `desired` against the catalog.
///
/// Runtimes that are not `available` are accepted with a warning. An unknown
/// runtime is fatal; the message lists the catalog, or says it could not be
/// listed when it is empty.
pub fn validate_runtime(desired: &str, catalog: &[RuntimeDescriptor]) -> Result<ValidatedRuntime> {
    let Some(runtime) = catalog.iter().find(|rt| rt.name == desired) else {
        return Err(Error::unknown_runtime(unknown_runtime_message(desired, catalog)));
    };

    let warning = lifecycle_warning(runtime);
    if let Some(message) = &warning {
        warn!(runtime = %runtime.name, status = %runtime.status, "{message}");
    }

    Ok(ValidatedRuntime {
        name: runtime.name.clone(),
        warning,
    })
}

fn lifecycle_warning(runtime: &RuntimeDescriptor) -> Option<String> {
    let name = &runtime.name;
    let detail = runtime
        .status_message
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(|m| format!(": {m}"))
        .unwrap_or_default();

    match &runtime.status {
        RuntimeStatus::Available => None,
        RuntimeStatus::EndOfSupport => Some(format!(
            "Runtime {name} has reached end of support: new functions can no longer use it{detail}"
        )),
        RuntimeStatus::EndOfLife => Some(format!(
            "Runtime {name} has reached end of life: deployed functions keep running but can no longer be updated{detail}"
        )),
        other => Some(format!("Runtime {name} is in status {other}{detail}")),
    }
}

fn unknown_runtime_message(desired: &str, catalog: &[RuntimeDescriptor]) -> String {
    if catalog.is_empty() {
        return format!("Runtime \"{desired}\" does not exist: cannot list runtimes");
    }
    let names: Vec<&str> = catalog.iter().map(|rt| rt.name.as_str()).collect();
    format!(
        "Runtime \"{desired}\" does not exist, must be one of: {}",
        names.join(", ")
    )
}
