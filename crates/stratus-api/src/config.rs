//! Client configuration

use std::time::Duration;

use stratus_common::model::Kind;

/// Public API root
pub const DEFAULT_API_ROOT: &str = "https://api.scaleway.com";

/// API version segment shared by both products
pub const API_VERSION: &str = "v1beta1";

/// Per-request timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to talk to the platform
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Region, e.g. `fr-par`
    pub region: String,
    /// Secret key sent as `X-Auth-Token`
    pub token: String,
    /// Project owning the namespace
    pub project_id: String,
    /// Product whose namespaces this client manages
    pub namespace_product: Kind,
    /// Scheme and host, overridable for tests
    pub api_root: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Config against the public API with default timeouts
    pub fn new(
        region: impl Into<String>,
        token: impl Into<String>,
        project_id: impl Into<String>,
        namespace_product: Kind,
    ) -> Self {
        Self {
            region: region.into(),
            token: token.into(),
            project_id: project_id.into(),
            namespace_product,
            api_root: DEFAULT_API_ROOT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point the client at another host
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Regional base URL for a product
    pub fn base_url(&self, product: Kind) -> String {
        let segment = match product {
            Kind::Function => "functions",
            Kind::Container => "containers",
        };
        format!(
            "{}/{segment}/{API_VERSION}/regions/{}",
            self.api_root.trim_end_matches('/'),
            self.region
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_per_product() {
        let config = ApiConfig::new("nl-ams", "t", "p", Kind::Function);

        assert_eq!(
            config.base_url(Kind::Function),
            "https://api.scaleway.com/functions/v1beta1/regions/nl-ams"
        );
        assert_eq!(
            config.base_url(Kind::Container),
            "https://api.scaleway.com/containers/v1beta1/regions/nl-ams"
        );
    }

    #[test]
    fn api_root_trailing_slash_is_ignored() {
        let config =
            ApiConfig::new("fr-par", "t", "p", Kind::Container).with_api_root("http://127.0.0.1:9000/");
        assert_eq!(
            config.base_url(Kind::Container),
            "http://127.0.0.1:9000/containers/v1beta1/regions/fr-par"
        );
    }
}
