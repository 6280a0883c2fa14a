//! Infoblox connection configuration

use serde::{Deserialize, Serialize};
use std::fmt;

use provisio_core::error::{ReconcileError, ReconcileResult};

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_site_attribute_name() -> String {
    "Site Code".to_string()
}

/// Settings for one Infoblox grid.
#[derive(Clone, Serialize, Deserialize)]
pub struct InfobloxConfig {
    /// WAPI root including the version, e.g.
    /// `https://infoblox.example.com/wapi/v2.11`.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Verify the grid's TLS certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the extensible attribute that holds the site code.
    #[serde(default = "default_site_attribute_name")]
    pub site_attribute_name: String,
}

impl Default for InfobloxConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            verify_tls: default_verify_tls(),
            timeout_secs: default_timeout_secs(),
            site_attribute_name: default_site_attribute_name(),
        }
    }
}

impl fmt::Debug for InfobloxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfobloxConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("site_attribute_name", &self.site_attribute_name)
            .finish()
    }
}

impl InfobloxConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disable certificate verification (lab grids with self-signed certs).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    pub fn with_site_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.site_attribute_name = name.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the full URL for a WAPI object path or `_ref`.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub fn validate(&self) -> ReconcileResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ReconcileError::Configuration {
                message: "infoblox.base_url is required (or set INFOBLOX_URL)".to_string(),
            });
        }
        let url = url::Url::parse(&self.base_url).map_err(|e| ReconcileError::Configuration {
            message: format!("invalid infoblox.base_url '{}': {e}", self.base_url),
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ReconcileError::Configuration {
                message: format!("unsupported scheme in infoblox.base_url: {}", url.scheme()),
            });
        }
        if !url.path().contains("/wapi/") {
            return Err(ReconcileError::Configuration {
                message: format!(
                    "infoblox.base_url must include the WAPI version, e.g. {}/wapi/v2.11",
                    url.origin().ascii_serialization()
                ),
            });
        }
        if self.username.as_deref().map_or(true, str::is_empty) || self.password.is_none() {
            return Err(ReconcileError::Configuration {
                message: "Infoblox credentials missing; set INFOBLOX_USERNAME and INFOBLOX_PASSWORD"
                    .to_string(),
            });
        }
        if self.site_attribute_name.trim().is_empty() {
            return Err(ReconcileError::Configuration {
                message: "infoblox.site_attribute_name must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> InfobloxConfig {
        InfobloxConfig::new("https://ib.example.com/wapi/v2.11").with_credentials("svc", "secret")
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_requires_wapi_version_in_url() {
        let config = InfobloxConfig::new("https://ib.example.com").with_credentials("svc", "secret");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("wapi/v2.11"));
    }

    #[test]
    fn test_requires_credentials() {
        let config = InfobloxConfig::new("https://ib.example.com/wapi/v2.11");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_builder() {
        assert_eq!(
            valid().url("network/ZG5zLm5ldHdvcmskMTAuMC4xLjAvMjYvMA:10.0.1.0/26/prod"),
            "https://ib.example.com/wapi/v2.11/network/ZG5zLm5ldHdvcmskMTAuMC4xLjAvMjYvMA:10.0.1.0/26/prod"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
