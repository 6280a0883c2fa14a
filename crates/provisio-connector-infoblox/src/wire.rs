//! WAPI object shapes.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use provisio_core::address::{parse_cidr, AddressBlock, BlockRef, ContainerInfo, NetworkView};
use provisio_core::error::{ReconcileError, ReconcileResult};

pub(crate) const NETWORK_FIELDS: &str = "network,network_view,comment,extattrs";
pub(crate) const CONTAINER_FIELDS: &str = "network,network_view,utilization";

#[derive(Debug, Deserialize)]
pub(crate) struct ExtAttr {
    pub value: Value,
}

/// A `network` object.
#[derive(Debug, Deserialize)]
pub(crate) struct WapiNetwork {
    #[serde(rename = "_ref")]
    pub reference: String,
    pub network: String,
    pub network_view: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub extattrs: HashMap<String, ExtAttr>,
}

impl WapiNetwork {
    pub fn into_block(self, site_attribute_name: &str) -> ReconcileResult<AddressBlock> {
        let network = parse_cidr(&self.network)
            .map_err(|e| ReconcileError::malformed(format!("bad network in WAPI object: {e}"), &self.network))?;
        let view = NetworkView::new(self.network_view.clone())
            .map_err(|e| ReconcileError::malformed(e.to_string(), &self.reference))?;
        let site_attribute = self.extattrs.get(site_attribute_name).map(|attr| match &attr.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        Ok(AddressBlock {
            view,
            network,
            label: self.comment.unwrap_or_default(),
            site_attribute,
            reference: Some(BlockRef::new(self.reference)),
        })
    }
}

/// A `networkcontainer` object.
#[derive(Debug, Deserialize)]
pub(crate) struct WapiContainer {
    #[serde(rename = "_ref")]
    pub reference: String,
    pub network: String,
    /// Tenths of a percent (0-1000).
    #[serde(default)]
    pub utilization: Option<u64>,
}

impl WapiContainer {
    pub fn into_info(self) -> ReconcileResult<ContainerInfo> {
        let network = parse_cidr(&self.network)
            .map_err(|e| ReconcileError::malformed(format!("bad container network: {e}"), &self.network))?;
        Ok(ContainerInfo {
            reference: BlockRef::new(self.reference),
            network,
            utilization_percent: self.utilization.map(|u| u as f64 / 10.0),
        })
    }
}

/// Result of `_function=next_available_network`.
#[derive(Debug, Deserialize)]
pub(crate) struct NextAvailable {
    #[serde(default)]
    pub networks: Vec<String>,
}

/// One entry of a supernet-literal next-available search. Grids answer
/// with either bare CIDR strings or network objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AvailableEntry {
    Literal(String),
    Object { network: String },
}

impl AvailableEntry {
    pub fn network(&self) -> &str {
        match self {
            AvailableEntry::Literal(network) | AvailableEntry::Object { network } => network,
        }
    }
}

/// WAPI error body.
#[derive(Debug, Deserialize)]
pub(crate) struct WapiError {
    #[serde(rename = "Error", default)]
    pub error: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub text: String,
}

impl WapiError {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn is_conflict(&self) -> bool {
        self.code.contains("Data.Conflict") || self.text.contains("already exists")
    }

    pub fn is_not_found(&self) -> bool {
        self.code.contains("Data.NotFound")
    }

    /// The allocator found no free block of the requested size.
    pub fn is_exhausted(&self) -> bool {
        self.text.contains("Cannot find") || self.error.contains("Cannot find")
    }
}
