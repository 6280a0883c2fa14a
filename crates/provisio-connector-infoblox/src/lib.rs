//! # Infoblox Connector
//!
//! [`AddressStore`](provisio_core::traits::AddressStore) backed by the
//! Infoblox WAPI.
//!
//! - Containers are `networkcontainer` objects; reservations are `network`
//!   objects whose `comment` carries the label.
//! - Allocation uses the container's `next_available_network` function,
//!   which proposes a block without reserving it.
//! - Created reservations carry one extensible attribute (the site code).
//!
//! ## Example
//!
//! ```ignore
//! use provisio_connector_infoblox::{InfobloxConfig, InfobloxStore};
//!
//! let config = InfobloxConfig::new("https://infoblox.example.com/wapi/v2.11")
//!     .with_credentials("svc-ipam", password);
//! let store = InfobloxStore::new(config)?;
//! ```

pub mod config;
pub mod store;
mod wire;

// Re-exports
pub use config::InfobloxConfig;
pub use store::InfobloxStore;
