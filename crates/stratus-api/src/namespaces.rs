//! Namespace endpoints

use serde::Serialize;

use stratus_common::model::{CreateNamespaceRequest, Namespace, UpdateNamespaceRequest};
use stratus_common::Result;

use crate::client::{list_field, ApiClient};

#[derive(Serialize)]
struct CreateBody<'a> {
    project_id: &'a str,
    #[serde(flatten)]
    request: &'a CreateNamespaceRequest,
}

impl ApiClient {
    /// First namespace of the project with this exact name
    pub async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let req = self
            .http
            .get(self.namespace_url("namespaces"))
            .query(&[("name", name), ("project_id", self.project_id.as_str())]);
        let body: serde_json::Value = self.send(req).await?;
        let namespaces: Vec<Namespace> = list_field(body, "namespaces")?;
        // the name filter is a prefix match server side
        Ok(namespaces.into_iter().find(|ns| ns.name == name))
    }

    /// Namespace by id; `None` once it is gone
    pub async fn get_namespace(&self, id: &str) -> Result<Option<Namespace>> {
        let req = self.http.get(self.namespace_url(&format!("namespaces/{id}")));
        self.send_optional(req).await
    }

    /// Create a namespace in the client's project
    pub async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<Namespace> {
        let body = CreateBody {
            project_id: &self.project_id,
            request,
        };
        let req = self.http.post(self.namespace_url("namespaces")).json(&body);
        self.send(req).await
    }

    /// Patch env and secrets
    pub async fn update_namespace(
        &self,
        id: &str,
        request: &UpdateNamespaceRequest,
    ) -> Result<Namespace> {
        let req = self
            .http
            .patch(self.namespace_url(&format!("namespaces/{id}")))
            .json(request);
        self.send(req).await
    }

    /// Start deleting a namespace and everything in it
    pub async fn delete_namespace(&self, id: &str) -> Result<Namespace> {
        let req = self
            .http
            .delete(self.namespace_url(&format!("namespaces/{id}")));
        self.send(req).await
    }
}
