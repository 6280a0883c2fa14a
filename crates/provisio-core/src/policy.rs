//! Access-control policy documents
//!
//! Wire shape follows the IAM policy JSON (`version`, `bindings`, `etag`).
//! Fields this crate does not interpret (e.g. `auditConfigs`) are kept in
//! `extra` so a fetch → write cycle never drops them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::{ReconcileError, ReconcileResult};
use crate::roles::Role;

/// Identifies the resource a policy is attached to (e.g. `projects/my-proj`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a cloud project.
    pub fn project(project_id: &str) -> Self {
        Self(format!("projects/{project_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment (the project id for `projects/<id>`).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque optimistic-concurrency token (etag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty or whitespace token makes a write unconditional, so it
    /// counts as no token at all.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One role-to-members mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: Role,

    #[serde(default)]
    pub members: Vec<String>,

    /// Present only on fetched documents; bindings this crate writes for
    /// targeted roles never carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl Binding {
    /// New unconditioned binding with a single member.
    pub fn new(role: Role, member: impl Into<String>) -> Self {
        Self {
            role,
            members: vec![member.into()],
            condition: None,
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }

    /// Sort members and drop duplicates.
    pub fn normalize_members(&mut self) {
        self.members.sort();
        self.members.dedup();
    }
}

fn default_version() -> i32 {
    1
}

/// A full policy document as read from (and written back to) the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default = "default_version")]
    pub version: i32,

    #[serde(default)]
    pub bindings: Vec<Binding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ConcurrencyToken>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            bindings: Vec::new(),
            etag: None,
            extra: Map::new(),
        }
    }
}

impl PolicyDocument {
    /// Decode a document from its JSON form.
    pub fn from_json(raw: &str) -> ReconcileResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ReconcileError::malformed(format!("policy document did not parse: {e}"), raw)
        })
    }

    /// Encode the document as JSON.
    pub fn to_json_pretty(&self) -> String {
        // Serializing plain data with string keys cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// The document's etag, if it carries a usable one.
    pub fn token(&self) -> Option<&ConcurrencyToken> {
        self.etag.as_ref().filter(|t| !t.is_blank())
    }

    pub fn binding(&self, role: &Role) -> Option<&Binding> {
        self.bindings.iter().find(|b| &b.role == role)
    }

    /// Members bound to a role across all of its bindings.
    pub fn members_of(&self, role: &Role) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| &b.role == role)
            .flat_map(|b| b.members.iter().map(String::as_str))
            .collect()
    }

    /// Check the binding invariants.
    ///
    /// Within one document each role has at most one unconditioned binding,
    /// and members inside a binding are unique. Conditioned bindings are
    /// externally owned and may share a role with each other.
    pub fn validate(&self) -> ReconcileResult<()> {
        let mut unconditioned = HashSet::new();
        for binding in &self.bindings {
            if binding.role.as_str().is_empty() {
                return Err(ReconcileError::invalid_input("binding with an empty role"));
            }
            if binding.condition.is_none() && !unconditioned.insert(binding.role.as_str()) {
                return Err(ReconcileError::invalid_input(format!(
                    "role '{}' has more than one unconditioned binding",
                    binding.role
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = binding.members.iter().find(|m| !seen.insert(m.as_str())) {
                return Err(ReconcileError::invalid_input(format!(
                    "member '{dup}' appears twice in role '{}'",
                    binding.role
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_policy_with_unknown_fields() {
        let raw = json!({
            "version": 3,
            "etag": "BwXhqDo=",
            "bindings": [
                {"role": "roles/viewer", "members": ["user:a@example.com"]},
                {
                    "role": "roles/editor",
                    "members": ["group:ops@example.com"],
                    "condition": {"title": "expires", "expression": "request.time < timestamp('2030-01-01T00:00:00Z')"}
                }
            ],
            "auditConfigs": [{"service": "allServices"}]
        })
        .to_string();

        let doc = PolicyDocument::from_json(&raw).unwrap();
        assert_eq!(doc.version, 3);
        assert_eq!(doc.etag, Some(ConcurrencyToken::new("BwXhqDo=")));
        assert_eq!(doc.bindings.len(), 2);
        assert!(doc.bindings[1].condition.is_some());
        assert!(doc.extra.contains_key("auditConfigs"));

        let encoded: Value = serde_json::from_str(&doc.to_json_pretty()).unwrap();
        assert_eq!(encoded["auditConfigs"][0]["service"], "allServices");
    }

    #[test]
    fn test_empty_policy_defaults() {
        let doc = PolicyDocument::from_json("{}").unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.bindings.is_empty());
        assert!(doc.etag.is_none());
    }

    #[test]
    fn test_blank_etag_is_not_a_token() {
        let doc = PolicyDocument::from_json(r#"{"etag": "", "bindings": []}"#).unwrap();
        assert_eq!(doc.etag, Some(ConcurrencyToken::new("")));
        assert!(doc.token().is_none());

        let doc = PolicyDocument::from_json(r#"{"etag": "BwX="}"#).unwrap();
        assert_eq!(doc.token(), Some(&ConcurrencyToken::new("BwX=")));
    }

    #[test]
    fn test_malformed_json_keeps_raw() {
        let err = PolicyDocument::from_json("Updated IAM policy for project").unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedResponse { ref raw, .. } if raw.contains("Updated IAM policy")));
    }

    #[test]
    fn test_validate_rejects_duplicate_unconditioned_roles() {
        let doc = PolicyDocument {
            bindings: vec![
                Binding::new(Role::new("roles/viewer"), "user:a@example.com"),
                Binding::new(Role::new("roles/viewer"), "user:b@example.com"),
            ],
            ..Default::default()
        };
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_members() {
        let mut binding = Binding::new(Role::new("roles/viewer"), "user:a@example.com");
        binding.members.push("user:a@example.com".to_string());
        let doc = PolicyDocument {
            bindings: vec![binding],
            ..Default::default()
        };
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_resource_key_id() {
        let key = ResourceKey::project("my-proj");
        assert_eq!(key.as_str(), "projects/my-proj");
        assert_eq!(key.id(), "my-proj");
    }
}
