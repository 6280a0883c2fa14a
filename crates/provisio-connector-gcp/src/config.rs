//! Google Cloud connector configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use provisio_core::error::{ReconcileError, ReconcileResult};

fn default_api_base_url() -> String {
    "https://cloudresourcemanager.googleapis.com/v3".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_gcloud_binary() -> String {
    "gcloud".to_string()
}

fn default_terraform_binary() -> String {
    "terraform".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Settings for the Resource Manager REST backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResourceManagerConfig {
    /// API root, without a trailing resource path.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth2 access token sent as a bearer token.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for ResourceManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManagerConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ResourceManagerConfig {
    /// Point the backend at a different API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the URL for a resource method such as `projects/p:getIamPolicy`.
    pub fn url(&self, path: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Check the configuration before any request is made.
    pub fn validate(&self) -> ReconcileResult<()> {
        let url = url::Url::parse(&self.api_base_url).map_err(|e| ReconcileError::Configuration {
            message: format!("invalid iam.api_base_url '{}': {e}", self.api_base_url),
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ReconcileError::Configuration {
                message: format!("unsupported scheme in iam.api_base_url: {}", url.scheme()),
            });
        }
        match self.access_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(()),
            _ => Err(ReconcileError::Configuration {
                message: "no access token for the IAM REST backend; set GOOGLE_OAUTH_ACCESS_TOKEN \
                          or iam.access_token"
                    .to_string(),
            }),
        }
    }
}

/// Settings for the `gcloud` CLI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcloudConfig {
    #[serde(default = "default_gcloud_binary")]
    pub binary: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GcloudConfig {
    fn default() -> Self {
        Self {
            binary: default_gcloud_binary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GcloudConfig {
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Settings for the Terraform state lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    #[serde(default = "default_terraform_binary")]
    pub binary: String,

    /// Directory holding the initialized Terraform configuration.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: default_terraform_binary(),
            working_dir: default_working_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
