//! HTTP plumbing shared by every endpoint

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use stratus_common::model::Kind;
use stratus_common::{Error, Result};

use crate::config::ApiConfig;

/// Header carrying the secret key
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Client for the functions and containers products
#[derive(Clone, Debug)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    /// No auth header: presigned URLs carry their own credentials
    pub(crate) upload_http: reqwest::Client,
    pub(crate) functions_url: String,
    pub(crate) containers_url: String,
    pub(crate) namespace_product: Kind,
    pub(crate) project_id: String,
}

impl ApiClient {
    /// Build a client; fails if the token cannot be sent as a header
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.token)
            .map_err(|_| Error::validation("API token contains characters not allowed in a header"))?;
        token.set_sensitive(true);
        headers.insert(AUTH_HEADER, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::internal_with_context("http-client", e.to_string()))?;
        let upload_http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal_with_context("http-client", e.to_string()))?;

        Ok(Self {
            http,
            upload_http,
            functions_url: config.base_url(Kind::Function),
            containers_url: config.base_url(Kind::Container),
            namespace_product: config.namespace_product,
            project_id: config.project_id.clone(),
        })
    }

    /// Project the client is scoped to
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub(crate) fn url(&self, product: Kind, path: &str) -> String {
        let base = match product {
            Kind::Function => &self.functions_url,
            Kind::Container => &self.containers_url,
        };
        format!("{base}/{path}")
    }

    pub(crate) fn namespace_url(&self, path: &str) -> String {
        self.url(self.namespace_product, path)
    }

    /// Send and decode a JSON body
    pub(crate) async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = execute(req).await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::serialization_for("response", e.to_string()))
    }

    /// Like [`send`](Self::send) but a 404 becomes `Ok(None)`
    pub(crate) async fn send_optional<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<Option<T>> {
        let resp = execute(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| Error::serialization_for("response", e.to_string()))
    }

    /// Send and ignore the body
    pub(crate) async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        let resp = execute(req).await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }
}

async fn execute(req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await.map_err(|e| Error::network(e.to_string()))?;
    debug!(status = resp.status().as_u16(), url = %resp.url(), "API response");
    Ok(resp)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    details: Vec<ArgumentDetail>,
}

#[derive(Debug, Deserialize)]
struct ArgumentDetail {
    #[serde(default)]
    argument_name: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    help_message: Option<String>,
}

async fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::transport(status.as_u16(), error_message(status, &body))
}

/// Best message available: the server's `message`, then `error_message`,
/// then the raw body. Argument errors list each offending field.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let mut message = parsed
        .message
        .or(parsed.error_message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        });

    if parsed.error_type.as_deref() == Some("invalid_arguments") && !parsed.details.is_empty() {
        let fields: Vec<String> = parsed
            .details
            .iter()
            .map(|d| {
                let why = d.help_message.as_deref().unwrap_or(&d.reason);
                format!("{}: {why}", d.argument_name)
            })
            .collect();
        message = format!("{message} ({})", fields.join(", "));
    }

    message
}

/// Items of a `{"<field>": [...]}` list response; a missing field is an empty list
pub(crate) fn list_field<T: DeserializeOwned>(mut body: serde_json::Value, field: &str) -> Result<Vec<T>> {
    match body.get_mut(field).map(serde_json::Value::take) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items).map_err(Error::from),
    }
}
