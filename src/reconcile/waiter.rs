//! Waiting for a rollout to finish

use tracing::{debug, info};

use stratus_common::model::RemoteResource;
use stratus_common::retry::{poll_until, PollPolicy};
use stratus_common::{Error, Result};

use crate::client::ResourceApi;
use crate::kind::ResourceKind;

/// Poll every resource of kind `K` in the namespace until all are `ready`.
///
/// The first resource reporting `error` fails the wait at once with its
/// error_message; no further poll is issued.
pub async fn wait_until_ready<K: ResourceKind>(
    api: &dyn ResourceApi<K>,
    namespace_id: &str,
    policy: &PollPolicy,
) -> Result<Vec<K::Remote>> {
    let what = format!("{}s of namespace {namespace_id} to be ready", K::KIND);

    let ready = poll_until(policy, &what, move || async move {
        let resources = api.list(namespace_id).await?;

        if let Some(failed) = resources.iter().find(|r| r.status().is_error()) {
            return Err(Error::remote_state(
                K::KIND.as_str(),
                failed.name(),
                failed.error_message().unwrap_or_default(),
            ));
        }

        let pending: Vec<&str> = resources
            .iter()
            .filter(|r| !r.status().is_ready())
            .map(|r| r.name())
            .collect();
        if pending.is_empty() {
            return Ok(Some(resources));
        }

        debug!(kind = %K::KIND, pending = ?pending, "Waiting for rollout");
        Ok(None)
    })
    .await?;

    info!(kind = %K::KIND, count = ready.len(), "All resources ready");
    Ok(ready)
}
