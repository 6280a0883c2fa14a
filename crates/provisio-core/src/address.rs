//! Address reservation types
//!
//! Reservations live in an external IPAM. A reservation is identified for
//! deletion by the exact (view, network, label) triple; the store reference
//! is what the delete call actually consumes.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReconcileError, ReconcileResult};

/// Namespace partitioning address space. Blocks are only comparable within
/// the same view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkView(String);

impl NetworkView {
    pub fn new(name: impl Into<String>) -> ReconcileResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ReconcileError::invalid_input("network view must not be blank"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-side handle of a reservation (an Infoblox `_ref`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRef(String);

impl BlockRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a CIDR literal, normalizing nothing: host bits must be zero.
pub fn parse_cidr(literal: &str) -> ReconcileResult<IpNetwork> {
    let network: IpNetwork = literal
        .trim()
        .parse()
        .map_err(|e| ReconcileError::invalid_input(format!("'{literal}' is not a CIDR block: {e}")))?;
    if network.network() != network.ip() {
        return Err(ReconcileError::invalid_input(format!(
            "'{literal}' has host bits set; did you mean {}/{}?",
            network.network(),
            network.prefix()
        )));
    }
    if !literal.contains('/') {
        return Err(ReconcileError::invalid_input(format!(
            "'{literal}' is missing a prefix length"
        )));
    }
    Ok(network)
}

/// Which parent to carve a child block from.
///
/// Both request shapes are supported by the store contract: by the parent's
/// network literal, or by an opaque container reference obtained through a
/// preceding lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParentBlock {
    Network { network: IpNetwork },
    Container { reference: BlockRef, network: IpNetwork },
}

impl ParentBlock {
    pub fn network(&self) -> IpNetwork {
        match self {
            ParentBlock::Network { network } | ParentBlock::Container { network, .. } => *network,
        }
    }
}

impl fmt::Display for ParentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.network())
    }
}

/// A parent network container as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub reference: BlockRef,
    pub network: IpNetwork,
    /// Utilization in percent, when the store reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_percent: Option<f64>,
}

/// A reserved child block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBlock {
    pub view: NetworkView,
    pub network: IpNetwork,
    /// Free-form comment used as the human identifier.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_attribute: Option<String>,
    /// Absent for blocks that were only simulated (dry-run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<BlockRef>,
}

impl AddressBlock {
    /// True when the block matches the triple exactly.
    pub fn matches(&self, view: &NetworkView, network: &IpNetwork, label: &str) -> bool {
        &self.view == view && &self.network == network && self.label == label
    }
}

/// Filters for a network query. Unset fields are not filtered on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkQuery {
    pub view: Option<NetworkView>,
    pub network: Option<IpNetwork>,
    pub label: Option<String>,
}

impl NetworkQuery {
    /// Query for the exact (view, network, label) triple.
    pub fn exact(view: &NetworkView, network: IpNetwork, label: &str) -> Self {
        Self {
            view: Some(view.clone()),
            network: Some(network),
            label: Some(label.to_string()),
        }
    }
}

/// Everything needed to create a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub view: NetworkView,
    pub network: IpNetwork,
    pub label: String,
    pub site_attribute: String,
}

impl NewReservation {
    /// The block this request would produce, without a store reference.
    pub fn simulated(&self) -> AddressBlock {
        AddressBlock {
            view: self.view.clone(),
            network: self.network,
            label: self.label.clone(),
            site_attribute: Some(self.site_attribute.clone()),
            reference: None,
        }
    }
}

/// Result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Reject blank labels; they cannot identify a reservation.
pub fn validate_label(label: &str) -> ReconcileResult<()> {
    if label.trim().is_empty() {
        return Err(ReconcileError::invalid_input(
            "label must not be empty or whitespace",
        ));
    }
    Ok(())
}
