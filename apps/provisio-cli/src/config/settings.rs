//! Configuration file loading and types.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use provisio_connector_gcp::{GcloudConfig, ResourceManagerConfig, TerraformConfig};
use provisio_connector_infoblox::InfobloxConfig;
use provisio_core::roles::BundleCatalog;
use provisio_core::workflow::AddressSettings;

use super::paths::ConfigLocation;
use crate::error::{CliError, CliResult};

/// Root configuration. Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub iam: IamSection,
    #[serde(default)]
    pub infoblox: InfobloxSection,
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// Extra or overriding role bundles, merged over the built-in table.
    #[serde(default)]
    pub bundles: BTreeMap<String, Vec<String>>,
}

/// Which PolicyStore backend talks to IAM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IamBackend {
    #[default]
    Rest,
    Gcloud,
}

impl FromStr for IamBackend {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(IamBackend::Rest),
            "gcloud" => Ok(IamBackend::Gcloud),
            other => Err(CliError::Config(format!(
                "unknown IAM backend '{other}' (expected 'rest' or 'gcloud')"
            ))),
        }
    }
}

/// `iam` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IamSection {
    #[serde(default)]
    pub backend: IamBackend,
    #[serde(flatten)]
    pub rest: ResourceManagerConfig,
    #[serde(default = "default_gcloud_binary")]
    pub gcloud_binary: String,
}

fn default_gcloud_binary() -> String {
    "gcloud".to_string()
}

impl Default for IamSection {
    fn default() -> Self {
        Self {
            backend: IamBackend::default(),
            rest: ResourceManagerConfig::default(),
            gcloud_binary: default_gcloud_binary(),
        }
    }
}

impl IamSection {
    pub fn gcloud(&self) -> GcloudConfig {
        GcloudConfig {
            binary: self.gcloud_binary.clone(),
            timeout_secs: self.rest.timeout_secs,
        }
    }
}

/// `infoblox` section.
#[derive(Debug, Clone, Deserialize)]
pub struct InfobloxSection {
    #[serde(flatten)]
    pub connection: InfobloxConfig,
    #[serde(default = "default_site_code")]
    pub default_site_code: String,
    #[serde(default = "default_resolve_parent_container")]
    pub resolve_parent_container: bool,
}

fn default_site_code() -> String {
    "GCP".to_string()
}

fn default_resolve_parent_container() -> bool {
    true
}

impl Default for InfobloxSection {
    fn default() -> Self {
        Self {
            connection: InfobloxConfig::default(),
            default_site_code: default_site_code(),
            resolve_parent_container: default_resolve_parent_container(),
        }
    }
}

impl InfobloxSection {
    pub fn address_settings(&self) -> AddressSettings {
        AddressSettings {
            resolve_parent_container: self.resolve_parent_container,
        }
    }
}

impl Config {
    /// Load from the resolved location, then apply environment overrides.
    pub fn load(location: &ConfigLocation) -> CliResult<Self> {
        let mut config = if location.path.exists() {
            Self::from_file(&location.path)?
        } else if location.required {
            return Err(CliError::Config(format!(
                "config file {} does not exist",
                location.path.display()
            )));
        } else {
            tracing::debug!(path = %location.path.display(), "no config file; using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> CliResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> CliResult<()> {
        if let Some(url) = lookup("INFOBLOX_URL") {
            self.infoblox.connection.base_url = url;
        }
        if let Some(username) = lookup("INFOBLOX_USERNAME") {
            self.infoblox.connection.username = Some(username);
        }
        if let Some(password) = lookup("INFOBLOX_PASSWORD") {
            self.infoblox.connection.password = Some(password);
        }
        if let Some(raw) = lookup("INFOBLOX_VERIFY_TLS") {
            self.infoblox.connection.verify_tls = parse_bool("INFOBLOX_VERIFY_TLS", &raw)?;
        }
        if let Some(token) = lookup("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.iam.rest.access_token = Some(token);
        }
        if let Some(backend) = lookup("PROVISIO_IAM_BACKEND") {
            self.iam.backend = backend.parse()?;
        }
        Ok(())
    }

    /// Built-in bundles with the configured overrides merged in.
    pub fn bundle_catalog(&self) -> CliResult<BundleCatalog> {
        Ok(BundleCatalog::with_overrides(&self.bundles)?)
    }
}

fn parse_bool(key: &str, raw: &str) -> CliResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CliError::Config(format!("{key} must be a boolean, got '{other}'"))),
    }
}
