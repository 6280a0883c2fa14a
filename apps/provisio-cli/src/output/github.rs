//! GitHub Actions step outputs

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Appends `key=value` lines to the file named by `$GITHUB_OUTPUT`.
#[derive(Debug, Clone)]
pub struct GithubOutput {
    path: PathBuf,
}

impl GithubOutput {
    /// Resolve the output file up front so a missing variable fails before
    /// anything is changed remotely.
    pub fn from_env() -> CliResult<Self> {
        match std::env::var_os("GITHUB_OUTPUT") {
            Some(path) if !path.is_empty() => Ok(Self::new(path)),
            _ => Err(CliError::Config(
                "--github-output was given but GITHUB_OUTPUT is not set".to_string(),
            )),
        }
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, key: &str, value: &str) -> CliResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CliError::Io(format!("cannot open {}: {e}", self.path.display())))?;
        writeln!(file, "{key}={value}")?;
        tracing::debug!(key, value, path = %self.path.display(), "wrote step output");
        Ok(())
    }
}
