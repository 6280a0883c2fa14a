//! # Google Cloud Connector
//!
//! Policy stores for Google Cloud project IAM and a Terraform state lookup
//! used to discover the project a deployment created.
//!
//! ## Backends
//!
//! - [`ResourceManagerPolicyStore`] - Resource Manager v3 REST API with a bearer token
//! - [`GcloudPolicyStore`] - the `gcloud` CLI, using the operator's active credentials
//! - [`TerraformStateSource`] - `terraform show -json` in a working directory
//!
//! ## Example
//!
//! ```ignore
//! use provisio_connector_gcp::{ResourceManagerConfig, ResourceManagerPolicyStore};
//! use provisio_core::prelude::*;
//!
//! let config = ResourceManagerConfig::default().with_access_token(token);
//! let store = ResourceManagerPolicyStore::new(config)?;
//! let policy = store.fetch(&ResourceKey::project("my-proj")).await?;
//! ```

pub mod config;
pub mod gcloud;
mod process;
pub mod rest;
pub mod terraform;

// Re-exports
pub use config::{GcloudConfig, ResourceManagerConfig, TerraformConfig};
pub use gcloud::GcloudPolicyStore;
pub use rest::ResourceManagerPolicyStore;
pub use terraform::TerraformStateSource;
