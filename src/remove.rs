//! Service removal
//!
//! Deleting the namespace cascades to its functions, containers and triggers.
//! The call returns once the namespace is gone.

use tracing::{debug, info, instrument};

use stratus_common::model::Status;
use stratus_common::retry::{poll_until, PollPolicy};
use stratus_common::{Error, Result};

use crate::client::NamespaceApi;

/// Delete the namespace named `name` and wait until it disappears
#[instrument(skip(api, policy))]
pub async fn remove_namespace(
    api: &dyn NamespaceApi,
    name: &str,
    policy: &PollPolicy,
) -> Result<()> {
    let namespace = api
        .find_namespace(name)
        .await?
        .ok_or_else(|| Error::not_found("namespace", name))?;

    info!(namespace = %name, "Removing namespace and its functions, containers and triggers");
    api.delete_namespace(&namespace.id).await?;

    let id = namespace.id.as_str();
    let what = format!("deletion of namespace {name}");
    poll_until(policy, &what, move || async move {
        match api.get_namespace(id).await? {
            None => Ok(Some(())),
            Some(current) if current.status == Status::Deleting => {
                debug!(namespace = %name, "Namespace is still deleting");
                Ok(None)
            }
            Some(current) if current.status.is_error() => Err(Error::remote_state(
                "namespace",
                name,
                current.error_message.unwrap_or_default(),
            )),
            Some(current) => Err(Error::internal_with_context(
                "remove",
                format!("namespace {name} left deletion in status {}", current.status),
            )),
        }
    })
    .await?;

    info!(namespace = %name, "Namespace has been deleted");
    Ok(())
}
