//! Configuration file location

use crate::error::{CliError, CliResult};
use std::path::{Path, PathBuf};

/// Where the configuration file is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// A missing file is an error only when the path was asked for explicitly.
    pub required: bool,
}

impl ConfigLocation {
    /// Resolve the configuration path
    ///
    /// Order: `--config`, then `PROVISIO_CONFIG`, then the platform default:
    /// - Linux: ~/.config/provisio/config.yaml
    /// - macOS: ~/Library/Application Support/provisio/config.yaml
    /// - Windows: %APPDATA%\provisio\config.yaml
    pub fn resolve(explicit: Option<&Path>) -> CliResult<Self> {
        Self::resolve_with(explicit, std::env::var("PROVISIO_CONFIG").ok())
    }

    fn resolve_with(explicit: Option<&Path>, from_env: Option<String>) -> CliResult<Self> {
        if let Some(path) = explicit {
            return Ok(Self {
                path: path.to_path_buf(),
                required: true,
            });
        }

        if let Some(path) = from_env.filter(|p| !p.trim().is_empty()) {
            return Ok(Self {
                path: PathBuf::from(path),
                required: true,
            });
        }

        let base_dir = dirs::config_dir().ok_or_else(|| {
            CliError::Config("Could not determine configuration directory".to_string())
        })?;

        Ok(Self {
            path: base_dir.join("provisio").join("config.yaml"),
            required: false,
        })
    }
}
