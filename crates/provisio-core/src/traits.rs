//! External collaborator traits
//!
//! The reconciler only sees these contracts. Authentication, transport and
//! the remote systems' own consistency guarantees live behind them.

use async_trait::async_trait;
use ipnetwork::IpNetwork;

use crate::address::{
    AddressBlock, BlockRef, ContainerInfo, DeleteOutcome, NetworkQuery, NetworkView,
    NewReservation, ParentBlock,
};
use crate::error::ReconcileResult;
use crate::policy::{PolicyDocument, ResourceKey};

/// Fetch/write access to an access-control policy.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Human readable backend name for logs.
    fn backend_name(&self) -> &str;

    /// Fetch the current policy. The returned document carries the store's
    /// concurrency token in `etag` when the store provided one.
    async fn fetch(&self, resource: &ResourceKey) -> ReconcileResult<PolicyDocument>;

    /// Write a full policy document.
    ///
    /// When [`PolicyStore::supports_conditional_write`] is true the store
    /// itself must reject the write with `Conflict` if `document.etag` no
    /// longer matches.
    async fn write(
        &self,
        resource: &ResourceKey,
        document: &PolicyDocument,
    ) -> ReconcileResult<PolicyDocument>;

    /// Whether `write` is conditional on the document's etag.
    fn supports_conditional_write(&self) -> bool {
        true
    }
}

/// Query/allocate/create/delete access to an IPAM.
#[async_trait]
pub trait AddressStore: Send + Sync {
    fn backend_name(&self) -> &str;

    /// List reservations matching the query filters.
    async fn query_networks(&self, query: &NetworkQuery) -> ReconcileResult<Vec<AddressBlock>>;

    /// Look up the container that holds `network` in `view`.
    async fn find_container(
        &self,
        view: &NetworkView,
        network: IpNetwork,
    ) -> ReconcileResult<Option<ContainerInfo>>;

    /// Ask the store for the next free child block. `Ok(None)` means the
    /// parent has no free block of that size.
    async fn allocate_next(
        &self,
        view: &NetworkView,
        parent: &ParentBlock,
        prefix_length: u8,
    ) -> ReconcileResult<Option<IpNetwork>>;

    /// Create a reservation.
    async fn create_network(&self, request: &NewReservation) -> ReconcileResult<AddressBlock>;

    /// Delete a reservation by store reference.
    async fn delete_network(&self, reference: &BlockRef) -> ReconcileResult<DeleteOutcome>;
}

/// Read-only key/value lookup yielding one resource identifier.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Return the value of `attribute` on the first resource of
    /// `resource_type`.
    async fn lookup(&self, resource_type: &str, attribute: &str) -> ReconcileResult<String>;
}
