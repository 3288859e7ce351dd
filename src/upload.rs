//! Function code upload
//!
//! Every function of a service runs from the same archive. For each function
//! the platform hands out a presigned URL sized to the archive, and the raw
//! bytes are PUT there before the function is deployed.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use stratus_common::retry::{retry_with_backoff, RetryConfig};
use stratus_common::{Error, Result};

use crate::client::CodeUploadApi;
use crate::reconcile::settle_all;

/// A function receiving the archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadTarget {
    /// Platform id
    pub id: String,
    /// Name, for diagnostics
    pub name: String,
}

/// Uploads a prebuilt archive to every function
pub struct CodeUploader {
    api: Arc<dyn CodeUploadApi>,
    retry: RetryConfig,
}

impl CodeUploader {
    /// Uploader retrying each PUT up to three times
    pub fn new(api: Arc<dyn CodeUploadApi>) -> Self {
        Self {
            api,
            retry: RetryConfig::with_max_attempts(3),
        }
    }

    /// Override the PUT retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Upload `archive` to every target concurrently
    #[instrument(skip(self, targets), fields(archive = %archive.display(), count = targets.len()))]
    pub async fn upload_all(&self, archive: &Path, targets: &[UploadTarget]) -> Result<()> {
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|e| Error::io(archive.display().to_string(), e))?;

        info!(size = bytes.len(), "Uploading source code");
        settle_all(
            "Upload",
            targets
                .iter()
                .map(|t| (t.name.as_str(), self.upload_one(t, &bytes))),
        )
        .await?;
        Ok(())
    }

    async fn upload_one(&self, target: &UploadTarget, bytes: &[u8]) -> Result<()> {
        let url = self
            .api
            .upload_url(&target.id, bytes.len() as u64)
            .await
            .map_err(|e| {
                Error::upload(
                    &target.name,
                    format!("could not get a presigned URL to upload the archive: {e}"),
                )
            })?;

        let operation = format!("upload archive to {}", target.name);
        retry_with_backoff(&self.retry, &operation, || {
            self.api.put_archive(&url, bytes.to_vec())
        })
        .await
        .map_err(|e| Error::upload(&target.name, e.to_string()))
    }
}
