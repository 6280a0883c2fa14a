//! In-memory stores
//!
//! Recording implementations of [`PolicyStore`] and [`AddressStore`] for
//! tests. Every call is logged so callers can assert which side effects
//! happened.

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::address::{
    AddressBlock, BlockRef, ContainerInfo, DeleteOutcome, NetworkQuery, NetworkView,
    NewReservation, ParentBlock,
};
use crate::error::{ReconcileError, ReconcileResult};
use crate::policy::{ConcurrencyToken, PolicyDocument, ResourceKey};
use crate::traits::{AddressStore, PolicyStore};

/// A call observed by an in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch(ResourceKey),
    Write(ResourceKey),
    Query,
    FindContainer(IpNetwork),
    Allocate { parent: IpNetwork, prefix_length: u8 },
    Create(IpNetwork),
    Delete(BlockRef),
}

impl StoreCall {
    /// True for calls that change remote state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            StoreCall::Write(_) | StoreCall::Create(_) | StoreCall::Delete(_)
        )
    }
}

#[derive(Default)]
struct PolicyState {
    policies: HashMap<ResourceKey, PolicyDocument>,
    calls: Vec<StoreCall>,
    generation: u64,
    /// Applied right after the next fetch, as if another writer got in.
    interleaved: Option<(ResourceKey, PolicyDocument)>,
}

impl PolicyState {
    fn next_token(&mut self) -> ConcurrencyToken {
        self.generation += 1;
        ConcurrencyToken::new(format!("mem-{}", self.generation))
    }
}

/// Policy store backed by a map.
///
/// Conditional by default: a write whose etag differs from the stored one is
/// rejected with `Conflict`. [`InMemoryPolicyStore::unconditional`] builds a
/// last-writer-wins store instead.
pub struct InMemoryPolicyStore {
    conditional: bool,
    state: Mutex<PolicyState>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            conditional: true,
            state: Mutex::new(PolicyState::default()),
        }
    }

    /// Store without a conditional write primitive.
    pub fn unconditional() -> Self {
        Self {
            conditional: false,
            ..Self::new()
        }
    }

    /// Seed a policy as-is, keeping its etag.
    pub async fn insert(&self, resource: ResourceKey, document: PolicyDocument) {
        self.state.lock().await.policies.insert(resource, document);
    }

    pub async fn get(&self, resource: &ResourceKey) -> Option<PolicyDocument> {
        self.state.lock().await.policies.get(resource).cloned()
    }

    /// Replace the stored policy right after the next fetch, with a fresh
    /// etag. Simulates a concurrent writer between fetch and write.
    pub async fn interleave_write(&self, resource: ResourceKey, document: PolicyDocument) {
        self.state.lock().await.interleaved = Some((resource, document));
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn mutating_calls(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .count()
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, resource: &ResourceKey) -> ReconcileResult<PolicyDocument> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Fetch(resource.clone()));

        let current = state
            .policies
            .get(resource)
            .cloned()
            .ok_or_else(|| ReconcileError::not_found(format!("policy for {resource}")))?;

        if let Some((target, mut document)) = state.interleaved.take() {
            document.etag = Some(state.next_token());
            state.policies.insert(target, document);
        }

        Ok(current)
    }

    async fn write(
        &self,
        resource: &ResourceKey,
        document: &PolicyDocument,
    ) -> ReconcileResult<PolicyDocument> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Write(resource.clone()));

        let stored = state.policies.get(resource).and_then(|p| p.etag.clone());
        if self.conditional && stored != document.etag {
            return Err(ReconcileError::Conflict {
                resource: resource.to_string(),
                expected: document
                    .etag
                    .as_ref()
                    .map_or_else(|| "<none>".to_string(), |t| t.to_string()),
                observed: stored.map_or_else(|| "<none>".to_string(), |t| t.to_string()),
            });
        }

        let mut written = document.clone();
        written.etag = Some(state.next_token());
        state.policies.insert(resource.clone(), written.clone());
        Ok(written)
    }

    fn supports_conditional_write(&self) -> bool {
        self.conditional
    }
}

#[derive(Default)]
struct AddressState {
    blocks: Vec<AddressBlock>,
    containers: Vec<(NetworkView, ContainerInfo)>,
    free: Vec<IpNetwork>,
    calls: Vec<StoreCall>,
    next_ref: u64,
}

/// Address store backed by a list of blocks.
///
/// `allocate_next` hands out the first configured free candidate that fits
/// the parent and the prefix length and is not yet reserved in the view. It
/// reserves nothing, like the real next-available call.
#[derive(Default)]
pub struct InMemoryAddressStore {
    state: Mutex<AddressState>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_container(&self, view: &NetworkView, network: IpNetwork, utilization: Option<f64>) {
        let mut state = self.state.lock().await;
        let reference = BlockRef::new(format!("networkcontainer/mem:{network}/{view}"));
        state.containers.push((
            view.clone(),
            ContainerInfo {
                reference,
                network,
                utilization_percent: utilization,
            },
        ));
    }

    /// Make `network` available to `allocate_next`.
    pub async fn add_free_block(&self, network: IpNetwork) {
        self.state.lock().await.free.push(network);
    }

    /// Seed an existing reservation, assigning a reference if absent.
    pub async fn add_block(&self, mut block: AddressBlock) -> AddressBlock {
        let mut state = self.state.lock().await;
        if block.reference.is_none() {
            state.next_ref += 1;
            block.reference = Some(BlockRef::new(format!(
                "network/mem{}:{}/{}",
                state.next_ref, block.network, block.view
            )));
        }
        state.blocks.push(block.clone());
        block
    }

    pub async fn blocks(&self) -> Vec<AddressBlock> {
        self.state.lock().await.blocks.clone()
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn mutating_calls(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .count()
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn query_networks(&self, query: &NetworkQuery) -> ReconcileResult<Vec<AddressBlock>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Query);
        Ok(state
            .blocks
            .iter()
            .filter(|b| query.view.as_ref().map_or(true, |v| &b.view == v))
            .filter(|b| query.network.map_or(true, |n| b.network == n))
            .filter(|b| query.label.as_ref().map_or(true, |l| &b.label == l))
            .cloned()
            .collect())
    }

    async fn find_container(
        &self,
        view: &NetworkView,
        network: IpNetwork,
    ) -> ReconcileResult<Option<ContainerInfo>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::FindContainer(network));
        Ok(state
            .containers
            .iter()
            .find(|(v, c)| v == view && c.network == network)
            .map(|(_, c)| c.clone()))
    }

    async fn allocate_next(
        &self,
        view: &NetworkView,
        parent: &ParentBlock,
        prefix_length: u8,
    ) -> ReconcileResult<Option<IpNetwork>> {
        let mut state = self.state.lock().await;
        let parent_net = parent.network();
        state.calls.push(StoreCall::Allocate {
            parent: parent_net,
            prefix_length,
        });

        let taken = |candidate: &IpNetwork| {
            state
                .blocks
                .iter()
                .any(|b| &b.view == view && b.network == *candidate)
        };
        Ok(state
            .free
            .iter()
            .filter(|c| c.prefix() == prefix_length)
            .filter(|c| parent_net.contains(c.network()))
            .find(|c| !taken(c))
            .copied())
    }

    async fn create_network(&self, request: &NewReservation) -> ReconcileResult<AddressBlock> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Create(request.network));

        if state
            .blocks
            .iter()
            .any(|b| b.view == request.view && b.network == request.network)
        {
            return Err(ReconcileError::AlreadyExists {
                message: format!(
                    "network {} already exists in view {}",
                    request.network, request.view
                ),
            });
        }

        state.next_ref += 1;
        let mut block = request.simulated();
        block.reference = Some(BlockRef::new(format!(
            "network/mem{}:{}/{}",
            state.next_ref, request.network, request.view
        )));
        state.blocks.push(block.clone());
        Ok(block)
    }

    async fn delete_network(&self, reference: &BlockRef) -> ReconcileResult<DeleteOutcome> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Delete(reference.clone()));

        let before = state.blocks.len();
        state
            .blocks
            .retain(|b| b.reference.as_ref() != Some(reference));
        if state.blocks.len() == before {
            Ok(DeleteOutcome::NotFound)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }
}
