//! Function and container endpoints
//!
//! Both products expose the same shape of CRUD plus deploy; only the
//! collection name and payload types differ.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use stratus_common::model::{
    Container, ContainerSpec, CreateRequest, Function, FunctionSpec, Kind, UpdateRequest,
};
use stratus_common::Result;

use crate::client::{list_field, ApiClient};

/// Presigned upload target for a function archive
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UploadUrl {
    /// URL accepting a single PUT of the archive
    pub url: String,
    /// Headers the PUT must carry
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, Vec<String>>,
}

fn collection(kind: Kind) -> &'static str {
    match kind {
        Kind::Function => "functions",
        Kind::Container => "containers",
    }
}

impl ApiClient {
    async fn list_in_namespace<T: DeserializeOwned>(
        &self,
        kind: Kind,
        namespace_id: &str,
    ) -> Result<Vec<T>> {
        let name = collection(kind);
        let req = self
            .http
            .get(self.url(kind, &format!("namespaces/{namespace_id}/{name}")))
            .query(&[("page_size", "100")]);
        let body: serde_json::Value = self.send(req).await?;
        list_field(body, name)
    }

    async fn get_one<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> Result<Option<T>> {
        let req = self
            .http
            .get(self.url(kind, &format!("{}/{id}", collection(kind))));
        self.send_optional(req).await
    }

    async fn create_one<T: DeserializeOwned, B: Serialize>(&self, kind: Kind, body: &B) -> Result<T> {
        let req = self.http.post(self.url(kind, collection(kind))).json(body);
        self.send(req).await
    }

    async fn update_one<T: DeserializeOwned, B: Serialize>(
        &self,
        kind: Kind,
        id: &str,
        body: &B,
    ) -> Result<T> {
        let req = self
            .http
            .patch(self.url(kind, &format!("{}/{id}", collection(kind))))
            .json(body);
        self.send(req).await
    }

    async fn delete_one<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> Result<T> {
        let req = self
            .http
            .delete(self.url(kind, &format!("{}/{id}", collection(kind))));
        self.send(req).await
    }

    async fn deploy_one<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> Result<T> {
        let req = self
            .http
            .post(self.url(kind, &format!("{}/{id}/deploy", collection(kind))))
            .json(&serde_json::json!({}));
        self.send(req).await
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Functions in a namespace
    pub async fn list_functions(&self, namespace_id: &str) -> Result<Vec<Function>> {
        self.list_in_namespace(Kind::Function, namespace_id).await
    }

    /// Function by id; `None` once it is gone
    pub async fn get_function(&self, id: &str) -> Result<Option<Function>> {
        self.get_one(Kind::Function, id).await
    }

    /// Create a function
    pub async fn create_function(&self, request: &CreateRequest<FunctionSpec>) -> Result<Function> {
        self.create_one(Kind::Function, request).await
    }

    /// Update a function without redeploying it
    pub async fn update_function(
        &self,
        id: &str,
        request: &UpdateRequest<FunctionSpec>,
    ) -> Result<Function> {
        self.update_one(Kind::Function, id, request).await
    }

    /// Start deleting a function
    pub async fn delete_function(&self, id: &str) -> Result<Function> {
        self.delete_one(Kind::Function, id).await
    }

    /// Roll out the last uploaded archive
    pub async fn deploy_function(&self, id: &str) -> Result<Function> {
        self.deploy_one(Kind::Function, id).await
    }

    /// Presigned URL for an archive of `content_length` bytes
    pub async fn function_upload_url(&self, id: &str, content_length: u64) -> Result<UploadUrl> {
        let req = self
            .http
            .get(self.url(Kind::Function, &format!("functions/{id}/upload-url")))
            .query(&[("content_length", content_length.to_string())]);
        self.send(req).await
    }

    /// PUT raw archive bytes to a presigned URL
    pub async fn put_archive(&self, upload: &UploadUrl, archive: Vec<u8>) -> Result<()> {
        let mut req = self
            .upload_http
            .put(&upload.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream");
        for (name, values) in &upload.headers {
            for value in values {
                req = req.header(name.as_str(), value.as_str());
            }
        }
        self.send_empty(req.body(archive)).await
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Containers in a namespace
    pub async fn list_containers(&self, namespace_id: &str) -> Result<Vec<Container>> {
        self.list_in_namespace(Kind::Container, namespace_id).await
    }

    /// Container by id; `None` once it is gone
    pub async fn get_container(&self, id: &str) -> Result<Option<Container>> {
        self.get_one(Kind::Container, id).await
    }

    /// Create a container
    pub async fn create_container(
        &self,
        request: &CreateRequest<ContainerSpec>,
    ) -> Result<Container> {
        self.create_one(Kind::Container, request).await
    }

    /// Update a container without redeploying it
    pub async fn update_container(
        &self,
        id: &str,
        request: &UpdateRequest<ContainerSpec>,
    ) -> Result<Container> {
        self.update_one(Kind::Container, id, request).await
    }

    /// Start deleting a container
    pub async fn delete_container(&self, id: &str) -> Result<Container> {
        self.delete_one(Kind::Container, id).await
    }

    /// Roll out the current image
    pub async fn deploy_container(&self, id: &str) -> Result<Container> {
        self.deploy_one(Kind::Container, id).await
    }
}
