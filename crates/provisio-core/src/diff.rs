//! Binding diff engine
//!
//! Computes the minimal modified policy document for one principal and a set
//! of target roles. The input document is never mutated; callers get a new
//! document plus the list of changes that produced it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::policy::{Binding, PolicyDocument};
use crate::principal::Principal;
use crate::roles::Role;

/// A single change made to a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum BindingChange {
    /// A new binding was appended for a role that had none.
    BindingCreated { role: Role, member: String },
    /// A member was added to an existing binding.
    MemberAdded { role: Role, member: String },
    /// A condition was stripped from a targeted binding.
    ConditionRemoved { role: Role },
    /// A member was removed from a binding.
    MemberRemoved { role: Role, member: String },
    /// A binding became empty and was dropped.
    BindingRemoved { role: Role },
}

impl std::fmt::Display for BindingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingChange::BindingCreated { role, member } => {
                write!(f, "+ {role}: new binding with {member}")
            }
            BindingChange::MemberAdded { role, member } => write!(f, "+ {role}: {member}"),
            BindingChange::ConditionRemoved { role } => write!(f, "~ {role}: condition removed"),
            BindingChange::MemberRemoved { role, member } => write!(f, "- {role}: {member}"),
            BindingChange::BindingRemoved { role } => {
                write!(f, "- {role}: binding removed (no members left)")
            }
        }
    }
}

/// Ordered list of changes between a fetched and a proposed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDelta {
    pub changes: Vec<BindingChange>,
}

impl PolicyDelta {
    /// True when the proposed document equals the fetched one.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn push(&mut self, change: BindingChange) {
        debug!(%change, "policy change");
        self.changes.push(change);
    }
}

/// Stateless engine turning desired role grants into document edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingDiffEngine;

impl BindingDiffEngine {
    /// Ensure `principal` is bound to every role in `roles`.
    ///
    /// Roles are processed in lexicographic order so the output is
    /// reproducible. Applying the same inputs to the output again yields an
    /// identical document and an empty delta.
    pub fn apply_desired_roles(
        document: &PolicyDocument,
        principal: &Principal,
        roles: &[Role],
    ) -> (PolicyDocument, PolicyDelta) {
        let member = principal.member();
        let targets: BTreeSet<&Role> = roles.iter().collect();

        let mut proposed = document.clone();
        let mut delta = PolicyDelta::default();

        for role in targets {
            match locate_binding(&proposed.bindings, role) {
                Some(index) => {
                    let binding = &mut proposed.bindings[index];
                    if !binding.has_member(&member) {
                        binding.members.push(member.clone());
                        binding.normalize_members();
                        delta.push(BindingChange::MemberAdded {
                            role: role.clone(),
                            member: member.clone(),
                        });
                    }
                    if binding.condition.take().is_some() {
                        delta.push(BindingChange::ConditionRemoved { role: role.clone() });
                    }
                }
                None => {
                    proposed
                        .bindings
                        .push(Binding::new(role.clone(), member.clone()));
                    delta.push(BindingChange::BindingCreated {
                        role: role.clone(),
                        member: member.clone(),
                    });
                }
            }
        }

        (proposed, delta)
    }

    /// Remove `principal` from every binding of `role`, dropping bindings
    /// this call leaves with no members. An absent member is a no-op.
    pub fn revoke_role(
        document: &PolicyDocument,
        principal: &Principal,
        role: &Role,
    ) -> (PolicyDocument, PolicyDelta) {
        let member = principal.member();
        let mut proposed = document.clone();
        let mut delta = PolicyDelta::default();

        let mut emptied = Vec::new();
        for (index, binding) in proposed.bindings.iter_mut().enumerate() {
            if &binding.role != role {
                continue;
            }
            let before = binding.members.len();
            binding.members.retain(|m| m != &member);
            if binding.members.len() != before {
                delta.push(BindingChange::MemberRemoved {
                    role: role.clone(),
                    member: member.clone(),
                });
                if binding.members.is_empty() {
                    emptied.push(index);
                }
            }
        }

        // Only bindings emptied here are dropped; pre-existing empty ones stay.
        for index in emptied.into_iter().rev() {
            proposed.bindings.remove(index);
            delta.push(BindingChange::BindingRemoved { role: role.clone() });
        }

        (proposed, delta)
    }
}

/// Pick the binding to edit for `role`.
///
/// An unconditioned binding wins; otherwise the first conditioned one is
/// used (and will have its condition stripped). Other conditioned bindings
/// for the same role are left alone.
fn locate_binding(bindings: &[Binding], role: &Role) -> Option<usize> {
    bindings
        .iter()
        .position(|b| &b.role == role && b.condition.is_none())
        .or_else(|| bindings.iter().position(|b| &b.role == role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ConcurrencyToken;
    use serde_json::json;

    fn sa() -> Principal {
        Principal::service_account("x@proj.iam.gserviceaccount.com").unwrap()
    }

    fn viewer_policy() -> PolicyDocument {
        PolicyDocument {
            bindings: vec![Binding::new(Role::new("roles/viewer"), "user:a@example.com")],
            etag: Some(ConcurrencyToken::new("T1")),
            ..Default::default()
        }
    }

    #[test]
    fn test_adds_member_sorted_and_keeps_token() {
        let (proposed, delta) =
            BindingDiffEngine::apply_desired_roles(&viewer_policy(), &sa(), &[Role::new("roles/viewer")]);

        assert_eq!(
            proposed.bindings[0].members,
            vec![
                "serviceAccount:x@proj.iam.gserviceaccount.com".to_string(),
                "user:a@example.com".to_string()
            ]
        );
        assert_eq!(proposed.etag, Some(ConcurrencyToken::new("T1")));
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn test_creates_binding_for_new_role() {
        let (proposed, delta) =
            BindingDiffEngine::apply_desired_roles(&viewer_policy(), &sa(), &[Role::new("roles/editor")]);

        assert_eq!(proposed.bindings.len(), 2);
        assert_eq!(proposed.bindings[1].role, Role::new("roles/editor"));
        assert_eq!(
            proposed.bindings[1].members,
            vec!["serviceAccount:x@proj.iam.gserviceaccount.com".to_string()]
        );
        assert!(matches!(delta.changes[0], BindingChange::BindingCreated { .. }));
    }

    #[test]
    fn test_idempotent() {
        let roles = [Role::new("roles/viewer"), Role::new("roles/storage.admin")];
        let (once, first) = BindingDiffEngine::apply_desired_roles(&viewer_policy(), &sa(), &roles);
        let (twice, second) = BindingDiffEngine::apply_desired_roles(&once, &sa(), &roles);

        assert!(!first.is_noop());
        assert!(second.is_noop());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_roles_processed_in_lexicographic_order() {
        let roles = [Role::new("roles/zeta"), Role::new("roles/alpha"), Role::new("roles/alpha")];
        let (proposed, delta) =
            BindingDiffEngine::apply_desired_roles(&PolicyDocument::default(), &sa(), &roles);

        let created: Vec<&str> = proposed.bindings.iter().map(|b| b.role.as_str()).collect();
        assert_eq!(created, vec!["roles/alpha", "roles/zeta"]);
        assert_eq!(delta.len(), 2);
    }

    #[test]
    fn test_strips_condition_from_targeted_binding() {
        let mut doc = viewer_policy();
        doc.bindings[0].members.push("serviceAccount:x@proj.iam.gserviceaccount.com".to_string());
        doc.bindings[0].condition = Some(json!({"title": "temp", "expression": "true"}));

        let (proposed, delta) =
            BindingDiffEngine::apply_desired_roles(&doc, &sa(), &[Role::new("roles/viewer")]);

        assert!(proposed.bindings[0].condition.is_none());
        assert_eq!(
            delta.changes,
            vec![BindingChange::ConditionRemoved {
                role: Role::new("roles/viewer")
            }]
        );
        assert!(proposed.validate().is_ok());
    }

    #[test]
    fn test_prefers_unconditioned_binding() {
        let mut conditioned = Binding::new(Role::new("roles/viewer"), "user:temp@example.com");
        conditioned.condition = Some(json!({"title": "temp", "expression": "true"}));
        let doc = PolicyDocument {
            bindings: vec![
                conditioned.clone(),
                Binding::new(Role::new("roles/viewer"), "user:a@example.com"),
            ],
            ..Default::default()
        };

        let (proposed, _) =
            BindingDiffEngine::apply_desired_roles(&doc, &sa(), &[Role::new("roles/viewer")]);

        assert_eq!(proposed.bindings[0], conditioned);
        assert!(proposed.bindings[1]
            .has_member("serviceAccount:x@proj.iam.gserviceaccount.com"));
        assert!(proposed.validate().is_ok());
    }

    #[test]
    fn test_no_cross_talk() {
        let mut doc = viewer_policy();
        doc.bindings.push(Binding::new(Role::new("roles/owner"), "user:boss@example.com"));
        let mut audit = Binding::new(Role::new("roles/logging.viewer"), "group:sec@example.com");
        audit.condition = Some(json!({"title": "c", "expression": "true"}));
        doc.bindings.push(audit);

        let (proposed, _) =
            BindingDiffEngine::apply_desired_roles(&doc, &sa(), &[Role::new("roles/viewer")]);

        assert_eq!(proposed.bindings[1], doc.bindings[1]);
        assert_eq!(proposed.bindings[2], doc.bindings[2]);
        assert_eq!(proposed.extra, doc.extra);
    }

    #[test]
    fn test_revoke_drops_empty_binding() {
        let doc = PolicyDocument {
            bindings: vec![
                Binding::new(Role::new("roles/owner"), "serviceAccount:x@proj.iam.gserviceaccount.com"),
                Binding::new(Role::new("roles/viewer"), "serviceAccount:x@proj.iam.gserviceaccount.com"),
            ],
            ..Default::default()
        };

        let (proposed, delta) = BindingDiffEngine::revoke_role(&doc, &sa(), &Role::new("roles/owner"));

        assert_eq!(proposed.bindings.len(), 1);
        assert_eq!(proposed.bindings[0].role, Role::new("roles/viewer"));
        assert_eq!(delta.len(), 2);
        assert!(matches!(delta.changes[1], BindingChange::BindingRemoved { .. }));
    }

    #[test]
    fn test_revoke_keeps_other_members() {
        let mut binding = Binding::new(Role::new("roles/owner"), "user:boss@example.com");
        binding.members.push("serviceAccount:x@proj.iam.gserviceaccount.com".to_string());
        let doc = PolicyDocument {
            bindings: vec![binding],
            ..Default::default()
        };

        let (proposed, delta) = BindingDiffEngine::revoke_role(&doc, &sa(), &Role::new("roles/owner"));
        assert_eq!(proposed.bindings[0].members, vec!["user:boss@example.com".to_string()]);
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn test_revoke_absent_member_is_noop() {
        let (proposed, delta) =
            BindingDiffEngine::revoke_role(&viewer_policy(), &sa(), &Role::new("roles/owner"));
        assert!(delta.is_noop());
        assert_eq!(proposed, viewer_policy());
    }

    #[test]
    fn test_revoke_leaves_preexisting_empty_binding() {
        let mut empty_owner = Binding::new(Role::new("roles/owner"), "unused");
        empty_owner.members.clear();
        let doc = PolicyDocument {
            bindings: vec![empty_owner, Binding::new(Role::new("roles/viewer"), "user:a@example.com")],
            etag: Some(ConcurrencyToken::new("T1")),
            ..Default::default()
        };

        let (proposed, delta) = BindingDiffEngine::revoke_role(&doc, &sa(), &Role::new("roles/owner"));

        assert!(delta.is_noop());
        assert_eq!(proposed, doc);
    }

    #[test]
    fn test_revoke_drops_only_binding_it_emptied() {
        let mut empty_owner = Binding::new(Role::new("roles/owner"), "unused");
        empty_owner.members.clear();
        let mut conditioned = Binding::new(Role::new("roles/owner"), "serviceAccount:x@proj.iam.gserviceaccount.com");
        conditioned.condition = Some(json!({"title": "temp", "expression": "true"}));
        let doc = PolicyDocument {
            bindings: vec![empty_owner.clone(), conditioned],
            ..Default::default()
        };

        let (proposed, delta) = BindingDiffEngine::revoke_role(&doc, &sa(), &Role::new("roles/owner"));

        assert_eq!(proposed.bindings, vec![empty_owner]);
        assert_eq!(delta.len(), 2);
    }
}
