//! Service manifest: the local, declarative description of a service
//!
//! The manifest is YAML. Functions live under `functions`, containers under
//! `custom.containers`, both keyed by name. Names are the only identity a
//! resource has across deploys.
//!
//! ```yaml
//! service: shop
//! singleSource: true
//! provider:
//!   runtime: node22
//!   env:
//!     MODE: production
//!   secret:
//!     DB_PASSWORD: ${DB_PASSWORD}
//! functions:
//!   checkout:
//!     handler: src/checkout.handle
//!     events:
//!       - schedule:
//!           rate: "0 * * * *"
//!           input: {reason: hourly}
//! custom:
//!   containers:
//!     api:
//!       directory: api
//!       port: 8080
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::Privacy;
use crate::{Error, Result};

/// File name looked up in the service directory
pub const MANIFEST_FILE: &str = "serverless.yml";

/// Root of a service manifest
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceManifest {
    /// Service name, also the namespace name
    pub service: String,
    /// Delete remote resources that are not declared here
    #[serde(default)]
    pub single_source: bool,
    /// Provider-level settings shared by every resource
    #[serde(default)]
    pub provider: ProviderDecl,
    /// Declared functions, keyed by name
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDecl>,
    /// Extension block holding containers
    #[serde(default)]
    pub custom: CustomDecl,
    /// Directory the manifest was loaded from; handler paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Provider-level settings
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDecl {
    /// Default function runtime
    #[serde(default)]
    pub runtime: Option<String>,
    /// Namespace environment; values must be strings
    #[serde(default)]
    pub env: BTreeMap<String, serde_yaml::Value>,
    /// Namespace secrets; values may reference `${ENV_VAR}`
    #[serde(default)]
    pub secret: BTreeMap<String, String>,
    /// Region, overridden by the CLI
    #[serde(default)]
    pub scw_region: Option<String>,
    /// Project id, overridden by the CLI
    #[serde(default)]
    pub scw_project: Option<String>,
}

/// Extension block
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CustomDecl {
    /// Declared containers, keyed by name
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerDecl>,
}

/// Timeout written either as seconds or as a duration string
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeoutDecl {
    /// Plain number of seconds
    Seconds(u64),
    /// Duration string such as `"300s"`
    Text(String),
}

impl TimeoutDecl {
    /// Duration string the platform accepts
    pub fn to_wire(&self) -> String {
        match self {
            TimeoutDecl::Seconds(s) => format!("{s}s"),
            TimeoutDecl::Text(t) => t.clone(),
        }
    }
}

/// A declared function
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    /// Map key in `functions`
    #[serde(skip)]
    pub name: String,
    /// `path/to/file.export`
    #[serde(default)]
    pub handler: Option<String>,
    /// Overrides the provider runtime
    #[serde(default)]
    pub runtime: Option<String>,
    /// Plain environment; values must be strings
    #[serde(default)]
    pub env: BTreeMap<String, serde_yaml::Value>,
    /// Secrets; values may reference `${ENV_VAR}`
    #[serde(default)]
    pub secret: BTreeMap<String, String>,
    /// Minimum number of instances
    #[serde(default)]
    pub min_scale: Option<u32>,
    /// Maximum number of instances
    #[serde(default)]
    pub max_scale: Option<u32>,
    /// Memory in MB
    #[serde(default)]
    pub memory_limit: Option<u32>,
    /// Invocation timeout
    #[serde(default)]
    pub timeout: Option<TimeoutDecl>,
    /// Public or private
    #[serde(default)]
    pub privacy: Option<Privacy>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// `enabled` or `redirected`
    #[serde(default)]
    pub http_option: Option<String>,
    /// Sandbox generation
    #[serde(default)]
    pub sandbox: Option<String>,
    /// Requested endpoint hostname
    #[serde(default, rename = "domain_name")]
    pub domain_name: Option<String>,
    /// Extra hostnames routed to this function
    #[serde(default, rename = "custom_domains")]
    pub custom_domains: Vec<String>,
    /// Invocation triggers
    #[serde(default)]
    pub events: Vec<EventDecl>,
}

/// A declared container
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDecl {
    /// Map key in `custom.containers`
    #[serde(skip)]
    pub name: String,
    /// Build context; when set the image is built and pushed on deploy
    #[serde(default)]
    pub directory: Option<String>,
    /// Prebuilt image; defaults to `<registry>/<name>:latest`
    #[serde(default)]
    pub registry_image: Option<String>,
    /// `--build-arg` values passed to the image build
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    /// Plain environment; values must be strings
    #[serde(default)]
    pub env: BTreeMap<String, serde_yaml::Value>,
    /// Secrets; values may reference `${ENV_VAR}`
    #[serde(default)]
    pub secret: BTreeMap<String, String>,
    /// Minimum number of instances
    #[serde(default)]
    pub min_scale: Option<u32>,
    /// Maximum number of instances
    #[serde(default)]
    pub max_scale: Option<u32>,
    /// Memory in MB
    #[serde(default)]
    pub memory_limit: Option<u32>,
    /// vCPU in thousandths
    #[serde(default)]
    pub cpu_limit: Option<u32>,
    /// Deprecated; use `scalingOption` with type `concurrentRequests`
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    /// Invocation timeout
    #[serde(default)]
    pub timeout: Option<TimeoutDecl>,
    /// Public or private
    #[serde(default)]
    pub privacy: Option<Privacy>,
    /// Port the image listens on
    #[serde(default)]
    pub port: Option<u16>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// `enabled` or `redirected`
    #[serde(default)]
    pub http_option: Option<String>,
    /// Sandbox generation
    #[serde(default)]
    pub sandbox: Option<String>,
    /// Liveness probe
    #[serde(default)]
    pub health_check: Option<HealthCheckDecl>,
    /// Autoscaling trigger
    #[serde(default)]
    pub scaling_option: Option<ScalingOptionDecl>,
    /// Private network to attach
    #[serde(default)]
    pub private_network_id: Option<String>,
    /// Extra hostnames routed to this container
    #[serde(default, rename = "custom_domains")]
    pub custom_domains: Vec<String>,
    /// Invocation triggers
    #[serde(default)]
    pub events: Vec<EventDecl>,
}

/// Declared health check
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckDecl {
    /// `http` or `tcp`; inferred from `httpPath` when absent
    #[serde(default, rename = "type")]
    pub probe_type: Option<String>,
    /// Path for HTTP probes
    #[serde(default)]
    pub http_path: Option<String>,
    /// Consecutive failures before restart
    #[serde(default)]
    pub failure_threshold: Option<u32>,
    /// Duration string between probes
    #[serde(default)]
    pub interval: Option<String>,
}

/// Declared autoscaling option
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScalingOptionDecl {
    /// `concurrentRequests`, `cpuUsage` or `memoryUsage`
    #[serde(default, rename = "type")]
    pub option_type: Option<String>,
    /// Threshold for the chosen metric
    #[serde(default)]
    pub threshold: Option<u32>,
}

/// One entry of `events`: a single-key map from trigger type to its settings
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct EventDecl(pub BTreeMap<String, serde_yaml::Value>);

/// Settings of a `schedule` event
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScheduleEvent {
    /// Five-field cron expression
    pub rate: String,
    /// JSON body sent on each invocation
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

impl EventDecl {
    /// Trigger types declared in this entry (exactly one when valid)
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The `schedule` settings, if this entry declares a well-formed one
    pub fn schedule(&self) -> Option<ScheduleEvent> {
        self.0
            .get("schedule")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
    }
}

impl ServiceManifest {
    /// Parse a manifest and bind each declaration to its map key
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut manifest: ServiceManifest = serde_yaml::from_str(text)?;
        for (name, f) in manifest.functions.iter_mut() {
            f.name = name.clone();
        }
        for (name, c) in manifest.custom.containers.iter_mut() {
            c.name = name.clone();
        }
        Ok(manifest)
    }

    /// Load `serverless.yml` from a service directory
    pub fn load(service_dir: &Path) -> Result<Self> {
        let path = service_dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut manifest = Self::from_yaml(&text)?;
        manifest.base_dir = service_dir.to_path_buf();
        Ok(manifest)
    }

    /// Declared functions in name order
    pub fn function_decls(&self) -> Vec<FunctionDecl> {
        self.functions.values().cloned().collect()
    }

    /// Declared containers in name order
    pub fn container_decls(&self) -> Vec<ContainerDecl> {
        self.custom.containers.values().cloned().collect()
    }

    /// Namespace environment with non-string values dropped
    pub fn namespace_env(&self) -> BTreeMap<String, String> {
        string_env(&self.provider.env)
    }
}

/// Keep only string-valued entries; validation reports the others
pub fn string_env(env: &BTreeMap<String, serde_yaml::Value>) -> BTreeMap<String, String> {
    env.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
service: shop
singleSource: true
provider:
  runtime: node22
  env:
    MODE: production
  secret:
    DB_PASSWORD: ${DB_PASSWORD}
functions:
  checkout:
    handler: src/checkout.handle
    timeout: 30
    custom_domains:
      - pay.example.com
    events:
      - schedule:
          rate: "0 * * * *"
          input:
            reason: hourly
custom:
  containers:
    api:
      directory: api
      port: 8080
      buildArgs:
        VERSION: "1.2"
      healthCheck:
        httpPath: /health
      scalingOption:
        type: cpuUsage
        threshold: 70
"#;

    #[test]
    fn parses_functions_and_containers_with_names() {
        let m = ServiceManifest::from_yaml(MANIFEST).unwrap();

        assert_eq!(m.service, "shop");
        assert!(m.single_source);
        assert_eq!(m.provider.runtime.as_deref(), Some("node22"));

        let checkout = &m.functions["checkout"];
        assert_eq!(checkout.name, "checkout");
        assert_eq!(checkout.timeout, Some(TimeoutDecl::Seconds(30)));
        assert_eq!(checkout.custom_domains, vec!["pay.example.com".to_string()]);

        let api = &m.custom.containers["api"];
        assert_eq!(api.name, "api");
        assert_eq!(api.port, Some(8080));
        assert_eq!(api.build_args["VERSION"], "1.2");
        assert_eq!(
            api.health_check.as_ref().and_then(|h| h.http_path.as_deref()),
            Some("/health")
        );
    }

    #[test]
    fn schedule_event_carries_input_as_json() {
        let m = ServiceManifest::from_yaml(MANIFEST).unwrap();
        let event = m.functions["checkout"].events[0].schedule().unwrap();

        assert_eq!(event.rate, "0 * * * *");
        assert_eq!(event.input, Some(serde_json::json!({"reason": "hourly"})));
    }

    #[test]
    fn non_string_env_values_are_dropped_from_namespace_env() {
        let m = ServiceManifest::from_yaml(
            "service: s\nprovider:\n  env:\n    A: a\n    B: 3\n",
        )
        .unwrap();

        let env = m.namespace_env();
        assert_eq!(env.len(), 1);
        assert_eq!(env["A"], "a");
    }

    #[test]
    fn timeout_seconds_become_duration_string() {
        assert_eq!(TimeoutDecl::Seconds(300).to_wire(), "300s");
        assert_eq!(TimeoutDecl::Text("5m".to_string()).to_wire(), "5m");
    }

    #[test]
    fn load_reads_manifest_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "service: loaded\n").unwrap();

        let m = ServiceManifest::load(dir.path()).unwrap();
        assert_eq!(m.service, "loaded");
        assert_eq!(m.base_dir, dir.path());
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let err = ServiceManifest::load(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
