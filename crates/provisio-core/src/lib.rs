//! # Provisio Core
//!
//! Read-modify-write reconciler against externally owned state.
//!
//! Two domains share one workflow: access-control policy bindings on a
//! cloud resource, and child block reservations in an IPAM. Each run
//! fetches the current state, computes an idempotent delta, and either
//! reports it (dry-run) or applies it only if the remote state has not
//! changed since it was read.
//!
//! ## Architecture
//!
//! - [`PolicyStore`], [`AddressStore`], [`StateSource`] - external collaborators
//! - [`BindingDiffEngine`] - pure policy diff
//! - [`ConcurrencyGuard`] - etag-checked writes
//! - [`CidrAllocator`], [`ReservationMatcher`] - address allocation and exact lookup
//! - [`ReconcileWorkflow`] - phase driver over a [`DiffComputer`]
//!
//! ## Example
//!
//! ```ignore
//! use provisio_core::prelude::*;
//!
//! let principal = Principal::service_account("ci@proj.iam.gserviceaccount.com")?;
//! let roles = BundleCatalog::builtin().resolve("GenAIViewer")?;
//! let diff = PolicyDiff::new(store, ResourceKey::project("proj"), PolicyIntent::Grant { principal, roles });
//!
//! match ReconcileWorkflow::new(diff, Mode::DryRun).run().await? {
//!     Outcome::Planned { plan } => println!("{} change(s)", plan.delta.len()),
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error taxonomy shared by both domains
//! - [`principal`] - Validated identity references
//! - [`roles`] - Roles and role bundles
//! - [`policy`] - Policy documents and concurrency tokens
//! - [`diff`] - Binding diff engine
//! - [`address`] - Address reservation types
//! - [`traits`] - Store traits
//! - [`guard`] - Optimistic concurrency guard
//! - [`allocator`] - Child block allocation
//! - [`matcher`] - Exact reservation lookup
//! - [`workflow`] - Phase driver and the two domain computers
//! - [`memory`] - In-memory recording stores

pub mod address;
pub mod allocator;
pub mod diff;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod memory;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod traits;
pub mod workflow;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error handling
    pub use crate::error::{ReconcileError, ReconcileResult};

    // Identities and roles
    pub use crate::principal::{Principal, PrincipalKind};
    pub use crate::roles::{BundleCatalog, Role};

    // Policies
    pub use crate::diff::{BindingChange, BindingDiffEngine, PolicyDelta};
    pub use crate::guard::ConcurrencyGuard;
    pub use crate::policy::{Binding, ConcurrencyToken, PolicyDocument, ResourceKey};

    // Addresses
    pub use crate::address::{
        parse_cidr, AddressBlock, BlockRef, ContainerInfo, DeleteOutcome, NetworkQuery,
        NetworkView, NewReservation, ParentBlock,
    };
    pub use crate::allocator::CidrAllocator;
    pub use crate::matcher::{MatchOutcome, ReservationMatcher};

    // Traits
    pub use crate::traits::{AddressStore, PolicyStore, StateSource};

    // Workflow
    pub use crate::workflow::{
        AddressApplied, AddressDiff, AddressIntent, AddressPlan, AddressSettings, Delta,
        DiffComputer, Mode, Outcome, PolicyDiff, PolicyIntent, PolicyPlan, ReconcileWorkflow,
    };
}

pub use prelude::*;

// Re-export async_trait for store implementors
pub use async_trait::async_trait;
