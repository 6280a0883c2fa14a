//! Address domain: reserve and release of IPAM blocks.

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Delta, DiffComputer};
use crate::address::{
    validate_label, AddressBlock, DeleteOutcome, NetworkView, NewReservation, ParentBlock,
};
use crate::allocator::CidrAllocator;
use crate::error::{ReconcileError, ReconcileResult};
use crate::matcher::{MatchOutcome, ReservationMatcher};
use crate::traits::AddressStore;

/// Knobs for the address domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSettings {
    /// Look up the supernet's container reference before allocating
    /// instead of allocating against the network literal.
    pub resolve_parent_container: bool,
}

impl Default for AddressSettings {
    fn default() -> Self {
        Self {
            resolve_parent_container: true,
        }
    }
}

/// Desired change for one reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressIntent {
    /// Carve the next free `/prefix_length` out of `supernet`.
    Reserve {
        view: NetworkView,
        supernet: IpNetwork,
        prefix_length: u8,
        label: String,
        site_attribute: String,
    },
    /// Delete the reservation matching the triple exactly.
    Release {
        view: NetworkView,
        network: IpNetwork,
        label: String,
    },
}

/// State observed by the fetch phase.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressSnapshot {
    Reserve {
        parent: ParentBlock,
        utilization_percent: Option<f64>,
    },
    Release {
        outcome: MatchOutcome,
    },
}

/// A computed address mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AddressPlan {
    Reserve {
        parent: ParentBlock,
        #[serde(skip_serializing_if = "Option::is_none")]
        utilization_percent: Option<f64>,
        proposed: AddressBlock,
    },
    Release {
        block: AddressBlock,
    },
}

/// What the store did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AddressApplied {
    Reserved { block: AddressBlock },
    Released { block: AddressBlock, outcome: DeleteOutcome },
}

/// Address domain for [`super::ReconcileWorkflow`].
pub struct AddressDiff {
    store: Arc<dyn AddressStore>,
    intent: AddressIntent,
    settings: AddressSettings,
}

impl AddressDiff {
    /// Validate the intent locally before any store call is made.
    pub fn new(
        store: Arc<dyn AddressStore>,
        intent: AddressIntent,
        settings: AddressSettings,
    ) -> ReconcileResult<Self> {
        match &intent {
            AddressIntent::Reserve {
                supernet,
                prefix_length,
                label,
                ..
            } => {
                if supernet.network() != supernet.ip() {
                    return Err(ReconcileError::invalid_input(format!(
                        "supernet {supernet} has host bits set"
                    )));
                }
                CidrAllocator::validate_request(*supernet, *prefix_length)?;
                validate_label(label)?;
            }
            AddressIntent::Release { label, .. } => validate_label(label)?,
        }
        Ok(Self {
            store,
            intent,
            settings,
        })
    }

    pub fn intent(&self) -> &AddressIntent {
        &self.intent
    }
}

#[async_trait]
impl DiffComputer for AddressDiff {
    type Snapshot = AddressSnapshot;
    type Plan = AddressPlan;
    type Applied = AddressApplied;

    fn domain(&self) -> &'static str {
        "address"
    }

    async fn fetch(&self) -> ReconcileResult<AddressSnapshot> {
        match &self.intent {
            AddressIntent::Reserve { view, supernet, .. } => {
                if !self.settings.resolve_parent_container {
                    return Ok(AddressSnapshot::Reserve {
                        parent: ParentBlock::Network { network: *supernet },
                        utilization_percent: None,
                    });
                }

                let container = self
                    .store
                    .find_container(view, *supernet)
                    .await?
                    .ok_or_else(|| {
                        ReconcileError::not_found(format!(
                            "network container {supernet} in view {view}"
                        ))
                    })?;
                info!(
                    backend = self.store.backend_name(),
                    container = %container.reference,
                    utilization = ?container.utilization_percent,
                    "parent container resolved"
                );
                Ok(AddressSnapshot::Reserve {
                    parent: ParentBlock::Container {
                        reference: container.reference,
                        network: container.network,
                    },
                    utilization_percent: container.utilization_percent,
                })
            }
            AddressIntent::Release {
                view,
                network,
                label,
            } => {
                let outcome =
                    ReservationMatcher::find_exact(self.store.as_ref(), view, *network, label)
                        .await?;
                Ok(AddressSnapshot::Release { outcome })
            }
        }
    }

    async fn compute(&self, snapshot: &AddressSnapshot) -> ReconcileResult<Delta<AddressPlan>> {
        match (&self.intent, snapshot) {
            (
                AddressIntent::Reserve {
                    view,
                    prefix_length,
                    label,
                    site_attribute,
                    ..
                },
                AddressSnapshot::Reserve {
                    parent,
                    utilization_percent,
                },
            ) => {
                let network =
                    CidrAllocator::allocate(self.store.as_ref(), view, parent, *prefix_length)
                        .await?;
                let request = NewReservation {
                    view: view.clone(),
                    network,
                    label: label.clone(),
                    site_attribute: site_attribute.clone(),
                };
                Ok(Delta::Change(AddressPlan::Reserve {
                    parent: parent.clone(),
                    utilization_percent: *utilization_percent,
                    proposed: request.simulated(),
                }))
            }
            (AddressIntent::Release { .. }, AddressSnapshot::Release { outcome }) => match outcome {
                MatchOutcome::NotFound => Ok(Delta::NoChange {
                    reason: "nothing to delete".to_string(),
                }),
                MatchOutcome::Found(block) => Ok(Delta::Change(AddressPlan::Release {
                    block: block.clone(),
                })),
            },
            _ => Err(ReconcileError::invalid_input(
                "address snapshot does not match the requested action",
            )),
        }
    }

    async fn apply(
        &self,
        _snapshot: &AddressSnapshot,
        plan: &AddressPlan,
    ) -> ReconcileResult<AddressApplied> {
        match plan {
            AddressPlan::Reserve { proposed, .. } => {
                let site = proposed.site_attribute.as_deref().unwrap_or_default();
                let block = CidrAllocator::create(
                    self.store.as_ref(),
                    &proposed.view,
                    proposed.network,
                    &proposed.label,
                    site,
                )
                .await?;
                Ok(AddressApplied::Reserved { block })
            }
            AddressPlan::Release { block } => {
                let reference = block.reference.as_ref().ok_or_else(|| {
                    ReconcileError::malformed(
                        "matched reservation has no store reference",
                        format!("{block:?}"),
                    )
                })?;
                let outcome = self.store.delete_network(reference).await?;
                if outcome == DeleteOutcome::NotFound {
                    warn!(reference = %reference, "reservation vanished before delete");
                } else {
                    info!(reference = %reference, network = %block.network, "reservation deleted");
                }
                Ok(AddressApplied::Released {
                    block: block.clone(),
                    outcome,
                })
            }
        }
    }
}
