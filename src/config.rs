//! Resolved deploy settings
//!
//! Values come from the CLI (flags or environment) first, then the manifest's
//! provider block, then defaults.

use std::path::PathBuf;
use std::time::Duration;

use stratus_common::manifest::ServiceManifest;
use stratus_common::retry::{
    PollPolicy, DELETE_POLL_INTERVAL, DEPLOY_POLL_INTERVAL, NAMESPACE_POLL_INTERVAL,
    REGISTRY_SETTLE_DELAY,
};
use stratus_common::DEFAULT_REGION;

/// Account credentials and target region
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API secret key, sent as `X-Auth-Token`
    pub token: String,
    /// Project owning the namespace
    pub project_id: String,
    /// Region hosting the namespace
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .finish()
    }
}

impl Credentials {
    /// Fill unset project and region from the manifest's provider block
    pub fn resolve(
        token: String,
        project_id: Option<String>,
        region: Option<String>,
        manifest: &ServiceManifest,
    ) -> Self {
        Self {
            token,
            project_id: project_id
                .or_else(|| manifest.provider.scw_project.clone())
                .unwrap_or_default(),
            region: region
                .or_else(|| manifest.provider.scw_region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }
}

/// Wait policies for each polling context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Namespace ready-wait, also used before container updates
    pub namespace: PollPolicy,
    /// Rollout wait after deploy
    pub deploy: PollPolicy,
    /// Orphan and namespace deletion wait
    pub delete: PollPolicy,
    /// Pause between image push and container deploy
    pub registry_settle: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            namespace: PollPolicy::every(NAMESPACE_POLL_INTERVAL),
            deploy: PollPolicy::every(DEPLOY_POLL_INTERVAL),
            delete: PollPolicy::every(DELETE_POLL_INTERVAL),
            registry_settle: REGISTRY_SETTLE_DELAY,
        }
    }
}

impl PollSettings {
    /// Bound every wait by `timeout`
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            namespace: self.namespace.with_timeout(timeout),
            deploy: self.deploy.with_timeout(timeout),
            delete: self.delete.with_timeout(timeout),
            registry_settle: self.registry_settle,
        }
    }
}

/// Everything a deploy needs besides the manifest and collaborators
#[derive(Clone, Debug)]
pub struct DeploySettings {
    /// Credentials and region
    pub credentials: Credentials,
    /// Overrides the manifest's `singleSource` when set
    pub single_source: Option<bool>,
    /// Prebuilt function archive
    pub archive: Option<PathBuf>,
    /// Wait policies
    pub polls: PollSettings,
}

impl DeploySettings {
    /// Effective single-source mode
    pub fn single_source(&self, manifest: &ServiceManifest) -> bool {
        self.single_source.unwrap_or(manifest.single_source)
    }
}
