//! Child block allocation.

use ipnetwork::IpNetwork;
use tracing::{debug, info};

use crate::address::{validate_label, AddressBlock, NetworkView, NewReservation, ParentBlock};
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::AddressStore;

/// Asks the store for the next free child block and creates reservations.
///
/// Allocation does not reserve. Between `allocate` and `create` another
/// caller may take the same block; the store's `AlreadyExists` is surfaced
/// unchanged in that case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CidrAllocator;

impl CidrAllocator {
    /// Check that a `/prefix_length` child can exist inside `parent`.
    pub fn validate_request(parent: IpNetwork, prefix_length: u8) -> ReconcileResult<()> {
        let max = if parent.is_ipv4() { 32 } else { 128 };
        if prefix_length > max {
            return Err(ReconcileError::invalid_input(format!(
                "prefix length /{prefix_length} is out of range for {parent}"
            )));
        }
        if prefix_length <= parent.prefix() {
            return Err(ReconcileError::invalid_input(format!(
                "prefix length /{prefix_length} must be longer than the parent's /{}",
                parent.prefix()
            )));
        }
        Ok(())
    }

    /// Return the next free `/prefix_length` block inside `parent`.
    pub async fn allocate<S>(
        store: &S,
        view: &NetworkView,
        parent: &ParentBlock,
        prefix_length: u8,
    ) -> ReconcileResult<IpNetwork>
    where
        S: AddressStore + ?Sized,
    {
        Self::validate_request(parent.network(), prefix_length)?;

        let block = store
            .allocate_next(view, parent, prefix_length)
            .await?
            .ok_or_else(|| ReconcileError::NoCapacity {
                view: view.to_string(),
                parent: parent.to_string(),
                prefix_length,
            })?;

        if block.prefix() != prefix_length || !parent.network().contains(block.network()) {
            return Err(ReconcileError::malformed(
                format!("store offered {block}, which is not a /{prefix_length} inside {parent}"),
                block.to_string(),
            ));
        }

        debug!(view = %view, parent = %parent, block = %block, "next available block");
        Ok(block)
    }

    /// Create a reservation for a previously allocated block.
    pub async fn create<S>(
        store: &S,
        view: &NetworkView,
        block: IpNetwork,
        label: &str,
        site_attribute: &str,
    ) -> ReconcileResult<AddressBlock>
    where
        S: AddressStore + ?Sized,
    {
        validate_label(label)?;
        let request = NewReservation {
            view: view.clone(),
            network: block,
            label: label.to_string(),
            site_attribute: site_attribute.to_string(),
        };
        let created = store.create_network(&request).await?;
        info!(view = %view, network = %created.network, label = %label, "reservation created");
        Ok(created)
    }
}
