//! Cron trigger reconciliation
//!
//! Triggers are never diffed: every existing trigger of a resource is deleted,
//! then the declared set is created. Declaring no events therefore removes all
//! triggers. Between the delete and the create the resource has no trigger.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use stratus_common::manifest::EventDecl;
use stratus_common::model::{CreateCronRequest, CronTrigger, ResourceRef};
use stratus_common::Result;

use crate::client::TriggerApi;
use crate::reconcile::settle_all;

/// Full-replace reconciler for cron triggers
pub struct TriggerReconciler {
    api: Arc<dyn TriggerApi>,
}

impl TriggerReconciler {
    /// Reconciler over the given trigger API
    pub fn new(api: Arc<dyn TriggerApi>) -> Self {
        Self { api }
    }

    /// Replace the triggers of one resource with its declared schedule events
    #[instrument(skip(self, events), fields(kind = %owner.kind, id = %owner.id))]
    pub async fn reconcile(
        &self,
        owner: &ResourceRef,
        name: &str,
        events: &[EventDecl],
    ) -> Result<Vec<CronTrigger>> {
        let existing = self.api.list_triggers(owner).await?;
        debug!(resource = %name, count = existing.len(), "Deleting previous triggers");
        settle_all(
            "Trigger deletion",
            existing.iter().map(|trigger| {
                (
                    trigger.id.as_str(),
                    self.api.delete_trigger(owner.kind, &trigger.id),
                )
            }),
        )
        .await?;

        let requests: Vec<CreateCronRequest> = events
            .iter()
            .filter_map(EventDecl::schedule)
            .map(|event| CreateCronRequest {
                owner: owner.clone(),
                schedule: event.rate,
                args: event
                    .input
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            })
            .collect();

        let created = settle_all(
            "Trigger creation",
            requests
                .iter()
                .map(|req| (req.schedule.as_str(), self.api.create_trigger(req))),
        )
        .await?;
        for trigger in &created {
            info!(resource = %name, schedule = %trigger.schedule, "Deployed a new trigger");
        }
        Ok(created)
    }

    /// Reconcile several resources concurrently.
    ///
    /// Every resource runs to completion even when another one fails; the
    /// first failure in input order is returned.
    pub async fn reconcile_all(
        &self,
        targets: &[(ResourceRef, String, Vec<EventDecl>)],
    ) -> Result<Vec<CronTrigger>> {
        let per_resource = settle_all(
            "Trigger reconciliation",
            targets
                .iter()
                .map(|(owner, name, events)| (name.as_str(), self.reconcile(owner, name, events))),
        )
        .await?;
        Ok(per_resource.into_iter().flatten().collect())
    }
}
