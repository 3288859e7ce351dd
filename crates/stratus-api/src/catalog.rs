//! Runtimes, cron triggers, custom domains and tokens

use chrono::{DateTime, SecondsFormat, Utc};

use stratus_common::model::{
    AccessToken, CreateCronRequest, CreateDomainRequest, CronTrigger, Domain, Kind, LogLine,
    ResourceRef, RuntimeDescriptor,
};
use stratus_common::Result;

use crate::client::{list_field, ApiClient};

impl ApiClient {
    /// Runtime catalog of the functions product
    pub async fn list_runtimes(&self) -> Result<Vec<RuntimeDescriptor>> {
        let req = self.http.get(self.url(Kind::Function, "runtimes"));
        let body: serde_json::Value = self.send(req).await?;
        list_field(body, "runtimes")
    }

    /// Cron triggers bound to a function or container
    pub async fn list_crons(&self, owner: &ResourceRef) -> Result<Vec<CronTrigger>> {
        let req = self
            .http
            .get(self.url(owner.kind, "crons"))
            .query(&[(owner.kind.owner_field(), owner.id.as_str()), ("page_size", "100")]);
        let body: serde_json::Value = self.send(req).await?;
        list_field(body, "crons")
    }

    /// Create a cron trigger
    pub async fn create_cron(&self, request: &CreateCronRequest) -> Result<CronTrigger> {
        let req = self
            .http
            .post(self.url(request.owner.kind, "crons"))
            .json(request);
        self.send(req).await
    }

    /// Delete a cron trigger; `kind` selects the product that owns it
    pub async fn delete_cron(&self, kind: Kind, id: &str) -> Result<()> {
        let req = self.http.delete(self.url(kind, &format!("crons/{id}")));
        self.send_empty(req).await
    }

    /// Custom domains routed to a function or container
    pub async fn list_domains(&self, owner: &ResourceRef) -> Result<Vec<Domain>> {
        let req = self
            .http
            .get(self.url(owner.kind, "domains"))
            .query(&[(owner.kind.owner_field(), owner.id.as_str()), ("page_size", "100")]);
        let body: serde_json::Value = self.send(req).await?;
        list_field(body, "domains")
    }

    /// Bind a hostname
    pub async fn create_domain(&self, request: &CreateDomainRequest) -> Result<Domain> {
        let req = self
            .http
            .post(self.url(request.owner.kind, "domains"))
            .json(request);
        self.send(req).await
    }

    /// Unbind a hostname
    pub async fn delete_domain(&self, kind: Kind, id: &str) -> Result<Domain> {
        let req = self.http.delete(self.url(kind, &format!("domains/{id}")));
        self.send(req).await
    }

    /// Recent log lines of a function or container, newest first
    pub async fn list_logs(&self, owner: &ResourceRef) -> Result<Vec<LogLine>> {
        let collection = match owner.kind {
            Kind::Function => "functions",
            Kind::Container => "containers",
        };
        let req = self
            .http
            .get(self.url(owner.kind, &format!("{collection}/{}/logs", owner.id)));
        let body: serde_json::Value = self.send(req).await?;
        list_field(body, "logs")
    }

    /// Token granting access to every resource in a namespace
    pub async fn issue_namespace_token(
        &self,
        namespace_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let req = self.http.get(self.namespace_url("issue-jwt")).query(&[
            ("namespace_id", namespace_id.to_string()),
            ("expiration_date", format_expiry(expires_at)),
        ]);
        self.send(req).await
    }

    /// Token granting access to a single private function or container
    pub async fn issue_resource_token(
        &self,
        owner: &ResourceRef,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let req = self.http.get(self.url(owner.kind, "issue-jwt")).query(&[
            (owner.kind.owner_field(), owner.id.clone()),
            ("expiration_date", format_expiry(expires_at)),
        ]);
        self.send(req).await
    }
}

fn format_expiry(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
