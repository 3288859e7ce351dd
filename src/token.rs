//! Access tokens for private resources
//!
//! One token covers the whole namespace; each private function or container
//! also gets its own, scoped to it alone.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use stratus_common::model::{Kind, Privacy, RemoteResource, ResourceRef};
use stratus_common::{Error, Result};

use crate::client::{NamespaceApi, ResourceApi, TokenApi};
use crate::kind::{Containers, Functions};
use crate::reconcile::settle_all;

/// What a token grants access to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenScope {
    /// Every resource of the namespace
    Namespace,
    /// A single function or container
    Resource(Kind),
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Namespace => f.write_str("namespace"),
            TokenScope::Resource(kind) => fmt::Display::fmt(kind, f),
        }
    }
}

/// A token and what it is for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    /// Scope
    pub scope: TokenScope,
    /// Name of the namespace or resource
    pub name: String,
    /// Bearer token
    pub token: String,
    /// Expiry requested
    pub expires_at: DateTime<Utc>,
}

/// Issues tokens for a deployed service
pub struct TokenIssuer {
    namespaces: Arc<dyn NamespaceApi>,
    functions: Arc<dyn ResourceApi<Functions>>,
    containers: Arc<dyn ResourceApi<Containers>>,
    tokens: Arc<dyn TokenApi>,
}

impl TokenIssuer {
    /// Issuer over the given collaborators
    pub fn new(
        namespaces: Arc<dyn NamespaceApi>,
        functions: Arc<dyn ResourceApi<Functions>>,
        containers: Arc<dyn ResourceApi<Containers>>,
        tokens: Arc<dyn TokenApi>,
    ) -> Self {
        Self {
            namespaces,
            functions,
            containers,
            tokens,
        }
    }

    /// Namespace token first, then one per private function, then one per
    /// private container
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        service: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<IssuedToken>> {
        let namespace = self
            .namespaces
            .find_namespace(service)
            .await?
            .ok_or_else(|| Error::not_found("namespace", service))?;

        let namespace_token = self
            .tokens
            .issue_namespace_token(&namespace.id, expires_at)
            .await?;
        let mut issued = vec![IssuedToken {
            scope: TokenScope::Namespace,
            name: namespace.name.clone(),
            token: namespace_token.token,
            expires_at,
        }];

        let functions = self.functions.list(&namespace.id).await?;
        let containers = self.containers.list(&namespace.id).await?;
        issued.extend(self.issue_private(Kind::Function, &functions, expires_at).await?);
        issued.extend(self.issue_private(Kind::Container, &containers, expires_at).await?);

        info!(count = issued.len(), "Issued tokens");
        Ok(issued)
    }

    async fn issue_private<R: RemoteResource>(
        &self,
        kind: Kind,
        resources: &[R],
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<IssuedToken>> {
        let private = resources.iter().filter(|r| r.privacy() == Privacy::Private);
        let requests = private.map(|r| {
            let request = async move {
                let owner = ResourceRef {
                    kind,
                    id: r.id().to_string(),
                };
                let token = self.tokens.issue_resource_token(&owner, expires_at).await?;
                Ok::<_, Error>(IssuedToken {
                    scope: TokenScope::Resource(kind),
                    name: r.name().to_string(),
                    token: token.token,
                    expires_at,
                })
            };
            (r.name(), request)
        });
        settle_all("Token issue", requests).await
    }
}
