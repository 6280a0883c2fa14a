//! Policy domain: grant and revoke on one resource.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{Delta, DiffComputer};
use crate::diff::{BindingDiffEngine, PolicyDelta};
use crate::error::{ReconcileError, ReconcileResult};
use crate::guard::ConcurrencyGuard;
use crate::policy::{ConcurrencyToken, PolicyDocument, ResourceKey};
use crate::principal::Principal;
use crate::roles::Role;
use crate::traits::PolicyStore;

/// Desired change for one principal on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyIntent {
    /// Ensure the principal holds every role.
    Grant { principal: Principal, roles: Vec<Role> },
    /// Remove the principal from one role.
    Revoke { principal: Principal, role: Role },
}

impl PolicyIntent {
    pub fn principal(&self) -> &Principal {
        match self {
            PolicyIntent::Grant { principal, .. } | PolicyIntent::Revoke { principal, .. } => {
                principal
            }
        }
    }
}

/// A computed policy mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyPlan {
    pub resource: ResourceKey,
    pub principal: Principal,
    pub expected_token: ConcurrencyToken,
    pub delta: PolicyDelta,
    pub proposed: PolicyDocument,
}

/// Policy domain for [`super::ReconcileWorkflow`].
pub struct PolicyDiff {
    store: Arc<dyn PolicyStore>,
    resource: ResourceKey,
    intent: PolicyIntent,
}

impl PolicyDiff {
    pub fn new(store: Arc<dyn PolicyStore>, resource: ResourceKey, intent: PolicyIntent) -> Self {
        Self {
            store,
            resource,
            intent,
        }
    }

    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    pub fn intent(&self) -> &PolicyIntent {
        &self.intent
    }
}

#[async_trait]
impl DiffComputer for PolicyDiff {
    type Snapshot = PolicyDocument;
    type Plan = PolicyPlan;
    type Applied = PolicyDocument;

    fn domain(&self) -> &'static str {
        "policy"
    }

    async fn fetch(&self) -> ReconcileResult<PolicyDocument> {
        let document = self.store.fetch(&self.resource).await?;
        debug!(
            backend = self.store.backend_name(),
            resource = %self.resource,
            bindings = document.bindings.len(),
            "policy fetched"
        );
        if document.token().is_none() {
            return Err(ReconcileError::MissingToken {
                resource: self.resource.to_string(),
            });
        }
        Ok(document)
    }

    async fn compute(&self, current: &PolicyDocument) -> ReconcileResult<Delta<PolicyPlan>> {
        let (proposed, delta) = match &self.intent {
            PolicyIntent::Grant { roles, .. } if roles.is_empty() => {
                return Ok(Delta::NoChange {
                    reason: "no roles requested".to_string(),
                });
            }
            PolicyIntent::Grant { principal, roles } => {
                BindingDiffEngine::apply_desired_roles(current, principal, roles)
            }
            PolicyIntent::Revoke { principal, role } => {
                BindingDiffEngine::revoke_role(current, principal, role)
            }
        };

        if delta.is_noop() {
            let principal = self.intent.principal();
            let reason = match &self.intent {
                PolicyIntent::Grant { roles, .. } => {
                    format!("{principal} already holds all {} requested role(s)", roles.len())
                }
                PolicyIntent::Revoke { role, .. } => format!("{principal} does not hold {role}"),
            };
            return Ok(Delta::NoChange { reason });
        }

        let expected_token = current
            .token()
            .cloned()
            .ok_or_else(|| ReconcileError::MissingToken {
                resource: self.resource.to_string(),
            })?;

        Ok(Delta::Change(PolicyPlan {
            resource: self.resource.clone(),
            principal: self.intent.principal().clone(),
            expected_token,
            delta,
            proposed,
        }))
    }

    async fn apply(
        &self,
        _current: &PolicyDocument,
        plan: &PolicyPlan,
    ) -> ReconcileResult<PolicyDocument> {
        ConcurrencyGuard::checked_apply(
            self.store.as_ref(),
            &plan.resource,
            &plan.proposed,
            Some(&plan.expected_token),
        )
        .await
    }
}
