//! Terraform state lookup
//!
//! Reads `terraform show -json` output and pulls an attribute off the first
//! resource of a given type, searching the root module and then its child
//! modules depth-first.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use provisio_core::error::{ReconcileError, ReconcileResult};
use provisio_core::traits::StateSource;

use crate::config::TerraformConfig;
use crate::process::run_command;

/// [`StateSource`] backed by the Terraform CLI.
#[derive(Debug, Clone)]
pub struct TerraformStateSource {
    config: TerraformConfig,
}

impl TerraformStateSource {
    pub fn new(config: TerraformConfig) -> Self {
        Self { config }
    }

    /// Look `attribute` up in an already captured `terraform show -json`.
    pub fn lookup_in_state(raw: &str, resource_type: &str, attribute: &str) -> ReconcileResult<String> {
        let state: Value = serde_json::from_str(raw).map_err(|e| {
            ReconcileError::malformed(format!("terraform state is not JSON: {e}"), raw)
        })?;
        let root = state
            .pointer("/values/root_module")
            .ok_or_else(|| ReconcileError::not_found("terraform state has no values.root_module (empty state?)"))?;

        find_in_module(root, resource_type, attribute).ok_or_else(|| {
            ReconcileError::not_found(format!(
                "no {resource_type} resource with a '{attribute}' value in the terraform state"
            ))
        })
    }
}

fn find_in_module(module: &Value, resource_type: &str, attribute: &str) -> Option<String> {
    let resources = module.get("resources").and_then(Value::as_array);
    let found = resources.into_iter().flatten().find_map(|resource| {
        if resource.get("type").and_then(Value::as_str) != Some(resource_type) {
            return None;
        }
        resource
            .pointer(&format!("/values/{attribute}"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    });
    if found.is_some() {
        return found;
    }

    module
        .get("child_modules")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|child| find_in_module(child, resource_type, attribute))
}

#[async_trait]
impl StateSource for TerraformStateSource {
    async fn lookup(&self, resource_type: &str, attribute: &str) -> ReconcileResult<String> {
        debug!(working_dir = %self.config.working_dir.display(), "reading terraform state");
        let output = run_command(
            &self.config.binary,
            &["show", "-json"],
            Some(&self.config.working_dir),
            Duration::from_secs(self.config.timeout_secs),
        )
        .await?;
        if !output.success {
            return Err(output.into_failure(&self.config.binary));
        }

        let value = Self::lookup_in_state(&output.stdout, resource_type, attribute)?;
        info!(resource_type, attribute, value = %value, "found value in terraform state");
        Ok(value)
    }
}
