//! CLI command implementations

pub mod bundles;
pub mod iam;
pub mod ipam;

use serde::Serialize;
use std::io;
use std::sync::Arc;

use provisio_connector_gcp::{GcloudPolicyStore, ResourceManagerPolicyStore};
use provisio_connector_infoblox::InfobloxStore;
use provisio_core::traits::{AddressStore, PolicyStore};

use crate::config::{Config, IamBackend};
use crate::error::CliResult;
use crate::output::report::write_json;
use crate::output::Printer;

/// Everything a command needs from the process: the loaded configuration and
/// the output format.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub json: bool,
}

impl Context {
    pub fn new(config: Config, json: bool) -> Self {
        Self { config, json }
    }

    /// Build the PolicyStore selected by `iam.backend`.
    pub fn policy_store(&self) -> CliResult<Arc<dyn PolicyStore>> {
        let store: Arc<dyn PolicyStore> = match self.config.iam.backend {
            IamBackend::Rest => Arc::new(ResourceManagerPolicyStore::new(self.config.iam.rest.clone())?),
            IamBackend::Gcloud => Arc::new(GcloudPolicyStore::new(self.config.iam.gcloud())),
        };
        tracing::debug!(backend = store.backend_name(), "policy store ready");
        Ok(store)
    }

    pub fn address_store(&self) -> CliResult<Arc<dyn AddressStore>> {
        let store = InfobloxStore::new(self.config.infoblox.connection.clone())?;
        Ok(Arc::new(store))
    }

    /// Print `value` as JSON, or run the text renderer.
    pub fn emit<T, F>(&self, value: &T, render: F) -> CliResult<()>
    where
        T: Serialize,
        F: FnOnce(&mut Printer<io::Stdout>) -> io::Result<()>,
    {
        if self.json {
            return write_json(io::stdout().lock(), value);
        }
        let mut printer = Printer::stdout();
        render(&mut printer)?;
        Ok(())
    }
}
