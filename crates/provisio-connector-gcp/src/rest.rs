//! Resource Manager v3 REST policy store
//!
//! `getIamPolicy` is always called with `requestedPolicyVersion: 3` so
//! conditioned bindings are returned in full and can be handled explicitly.
//! `setIamPolicy` carries the fetched etag, which makes the write
//! conditional on the server side.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use provisio_core::error::{ReconcileError, ReconcileResult};
use provisio_core::policy::{PolicyDocument, ResourceKey};
use provisio_core::traits::PolicyStore;

use crate::config::ResourceManagerConfig;

/// Policy store talking to `cloudresourcemanager.googleapis.com`.
pub struct ResourceManagerPolicyStore {
    config: ResourceManagerConfig,
    client: Client,
}

impl std::fmt::Debug for ResourceManagerPolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManagerPolicyStore")
            .field("config", &self.config)
            .finish()
    }
}

impl ResourceManagerPolicyStore {
    /// Create a store. Fails when the base URL is invalid or no token is set.
    pub fn new(config: ResourceManagerConfig) -> ReconcileResult<Self> {
        config.validate()?;
        let client = Self::build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_client(config: &ResourceManagerConfig) -> ReconcileResult<Client> {
        Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()
            .map_err(|e| ReconcileError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    fn token(&self) -> &str {
        self.config.access_token.as_deref().unwrap_or_default()
    }

    /// POST a JSON body to `{resource}:{method}` and return the raw body.
    async fn call(&self, resource: &ResourceKey, method: &str, body: &Value) -> ReconcileResult<(StatusCode, String)> {
        let url = self.config.url(&format!("{resource}:{method}"));
        debug!(url = %url, "IAM API request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token())
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ReconcileError::unavailable_with_source(format!("request to {url} failed"), e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ReconcileError::unavailable_with_source(format!("failed to read response from {url}"), e)
        })?;
        debug!(status = %status, bytes = text.len(), "IAM API response");
        Ok((status, text))
    }

    /// Map a non-success response to the error taxonomy.
    fn handle_response_error(
        &self,
        resource: &ResourceKey,
        expected_etag: Option<&str>,
        status: StatusCode,
        body: &str,
    ) -> ReconcileError {
        let api_status = serde_json::from_str::<Value>(body).ok().and_then(|v| {
            v.pointer("/error/status")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        if status == StatusCode::CONFLICT || api_status.as_deref() == Some("ABORTED") {
            warn!(resource = %resource, "policy write rejected: etag mismatch");
            return ReconcileError::Conflict {
                resource: resource.to_string(),
                expected: expected_etag.unwrap_or("<none>").to_string(),
                observed: "<changed on server>".to_string(),
            };
        }

        match status {
            StatusCode::NOT_FOUND => ReconcileError::not_found(format!("{resource}: {body}")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReconcileError::unavailable(
                format!("HTTP {status}: access to {resource} denied:\n{body}"),
            ),
            _ => ReconcileError::unavailable(format!("HTTP {status}:\n{body}")),
        }
    }
}

#[async_trait]
impl PolicyStore for ResourceManagerPolicyStore {
    fn backend_name(&self) -> &str {
        "resource-manager"
    }

    #[instrument(skip(self), fields(resource = %resource))]
    async fn fetch(&self, resource: &ResourceKey) -> ReconcileResult<PolicyDocument> {
        let body = json!({ "options": { "requestedPolicyVersion": 3 } });
        let (status, text) = self.call(resource, "getIamPolicy", &body).await?;
        if !status.is_success() {
            return Err(self.handle_response_error(resource, None, status, &text));
        }
        PolicyDocument::from_json(&text)
    }

    #[instrument(skip(self, document), fields(resource = %resource))]
    async fn write(
        &self,
        resource: &ResourceKey,
        document: &PolicyDocument,
    ) -> ReconcileResult<PolicyDocument> {
        let body = json!({ "policy": document });
        let (status, text) = self.call(resource, "setIamPolicy", &body).await?;
        if !status.is_success() {
            let expected = document.etag.as_ref().map(|t| t.as_str());
            return Err(self.handle_response_error(resource, expected, status, &text));
        }
        let written = PolicyDocument::from_json(&text)?;
        info!(resource = %resource, bindings = written.bindings.len(), "IAM policy updated");
        Ok(written)
    }
}
