//! Container image build and push
//!
//! The pipeline only sees [`ImageBuilder`]. [`DockerCli`] drives the local
//! `docker` binary: log in to the namespace registry with the API token, build
//! the context directory, check the image targets `linux/amd64`, push.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use stratus_common::{Error, Result};

/// Architecture the platform runs
pub const REQUIRED_ARCHITECTURE: &str = "amd64";

/// Builds an image from a directory and pushes it under a tag
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Authenticate against the registry; called once before any build
    async fn login(&self) -> Result<()>;

    /// Build `directory` as `image`, then push it
    async fn build_and_push(
        &self,
        directory: &Path,
        image: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// [`ImageBuilder`] backed by the docker CLI
#[derive(Clone)]
pub struct DockerCli {
    binary: String,
    registry: String,
    token: String,
}

impl std::fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCli")
            .field("binary", &self.binary)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl DockerCli {
    /// Docker client for the registry of `region`, authenticating with `token`
    pub fn new(region: &str, token: impl Into<String>) -> Self {
        Self {
            binary: "docker".to_string(),
            registry: format!("rg.{region}.scw.cloud"),
            token: token.into(),
        }
    }

    /// Use another docker-compatible binary (podman, nerdctl)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run the binary and return its stdout. A non-zero exit becomes an
    /// [`Error::ImageBuild`] carrying stderr.
    async fn run(&self, image: &str, args: &[String], stdin: Option<&str>) -> Result<String> {
        debug!(binary = %self.binary, args = ?args, "Running");
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::image_build(image, format!("could not run {}: {e}", self.binary)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| Error::image_build(image, format!("could not write to {}: {e}", self.binary)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::image_build(image, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let verb = args.first().map(String::as_str).unwrap_or_default();
            return Err(Error::image_build(
                image,
                format!("{} {verb} failed: {}", self.binary, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn login(&self) -> Result<()> {
        let args = vec![
            "login".to_string(),
            self.registry.clone(),
            "--username".to_string(),
            "nologin".to_string(),
            "--password-stdin".to_string(),
        ];
        self.run(&self.registry, &args, Some(&self.token)).await?;
        info!(registry = %self.registry, "Logged in to registry");
        Ok(())
    }

    #[instrument(skip(self, build_args))]
    async fn build_and_push(
        &self,
        directory: &Path,
        image: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!(image = %image, "Building and pushing container");

        self.run(image, &build_command(directory, image, build_args), None)
            .await?;

        let inspect = vec![
            "image".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{.Architecture}}".to_string(),
            image.to_string(),
        ];
        let architecture = self.run(image, &inspect, None).await.map_err(|_| {
            Error::image_build(image, format!("Image {image} does not exist after build"))
        })?;
        check_architecture(image, architecture.trim())?;

        self.run(image, &["push".to_string(), image.to_string()], None)
            .await?;
        info!(image = %image, "Pushed");
        Ok(())
    }
}

/// `docker build` arguments; build args are passed in name order
pub fn build_command(
    directory: &Path,
    image: &str,
    build_args: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut args = vec!["build".to_string(), "-t".to_string(), image.to_string()];
    for (key, value) in build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(directory.display().to_string());
    args
}

/// Reject images built for another architecture, typically arm64 on Apple silicon
pub fn check_architecture(image: &str, architecture: &str) -> Result<()> {
    if architecture == REQUIRED_ARCHITECTURE {
        return Ok(());
    }
    Err(Error::image_build(
        image,
        format!(
            "the image was built for {architecture}, but the platform runs linux/amd64. \
             Pull the base image with `docker pull --platform=linux/amd64 <base_image>` and deploy again"
        ),
    ))
}
