//! `gcloud` CLI policy store
//!
//! Uses whatever credentials the local `gcloud` installation is logged in
//! with. Writes go through a scratch JSON file that is removed when the
//! call returns, on success and on failure alike.

use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tracing::{info, instrument, warn};

use provisio_core::error::{ReconcileError, ReconcileResult};
use provisio_core::policy::{PolicyDocument, ResourceKey};
use provisio_core::traits::PolicyStore;

use crate::config::GcloudConfig;
use crate::process::run_command;

/// Policy store driving `gcloud projects get-iam-policy / set-iam-policy`.
#[derive(Debug, Clone)]
pub struct GcloudPolicyStore {
    config: GcloudConfig,
}

impl GcloudPolicyStore {
    pub fn new(config: GcloudConfig) -> Self {
        Self { config }
    }

    fn limit(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Only project policies are reachable through `gcloud projects`.
    fn project_id<'a>(&self, resource: &'a ResourceKey) -> ReconcileResult<&'a str> {
        match resource.as_str().strip_prefix("projects/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Ok(id),
            _ => Err(ReconcileError::Configuration {
                message: format!("the gcloud backend only handles projects/<id>, got {resource}"),
            }),
        }
    }
}

/// True when gcloud's stderr describes an etag mismatch.
fn is_concurrency_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("etag") || lower.contains("concurrent policy changes") || lower.contains("aborted")
}

#[async_trait]
impl PolicyStore for GcloudPolicyStore {
    fn backend_name(&self) -> &str {
        "gcloud"
    }

    #[instrument(skip(self), fields(resource = %resource))]
    async fn fetch(&self, resource: &ResourceKey) -> ReconcileResult<PolicyDocument> {
        let project = self.project_id(resource)?;
        let output = run_command(
            &self.config.binary,
            &["projects", "get-iam-policy", project, "--format=json"],
            None,
            self.limit(),
        )
        .await?;

        if !output.success {
            return Err(output.into_failure(&self.config.binary));
        }
        PolicyDocument::from_json(&output.stdout)
    }

    #[instrument(skip(self, document), fields(resource = %resource))]
    async fn write(
        &self,
        resource: &ResourceKey,
        document: &PolicyDocument,
    ) -> ReconcileResult<PolicyDocument> {
        let project = self.project_id(resource)?;

        let mut scratch = tempfile::Builder::new()
            .prefix("provisio-policy-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| ReconcileError::unavailable_with_source("failed to create scratch file", e))?;
        scratch
            .write_all(document.to_json_pretty().as_bytes())
            .and_then(|()| scratch.flush())
            .map_err(|e| ReconcileError::unavailable_with_source("failed to write scratch file", e))?;

        let path = scratch.path().to_string_lossy().into_owned();
        let output = run_command(
            &self.config.binary,
            &["projects", "set-iam-policy", project, path.as_str(), "--format=json"],
            None,
            self.limit(),
        )
        .await;
        drop(scratch);
        let output = output?;

        if !output.success {
            if is_concurrency_failure(&output.stderr) {
                warn!(resource = %resource, "gcloud rejected the write: policy changed");
                return Err(ReconcileError::Conflict {
                    resource: resource.to_string(),
                    expected: document
                        .etag
                        .as_ref()
                        .map_or_else(|| "<none>".to_string(), |t| t.to_string()),
                    observed: output.stderr.trim().to_string(),
                });
            }
            return Err(output.into_failure(&self.config.binary));
        }

        let written = PolicyDocument::from_json(&output.stdout)?;
        info!(resource = %resource, bindings = written.bindings.len(), "IAM policy updated");
        Ok(written)
    }
}
