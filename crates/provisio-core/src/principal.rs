//! Principal identities
//!
//! A principal is the member side of a binding. It serializes to the
//! `"<kind>:<email>"` form used inside policy documents.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReconcileError, ReconcileResult};

/// Kind of identity a principal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrincipalKind {
    ServiceAccount,
    Group,
    User,
}

impl PrincipalKind {
    /// Prefix used in serialized member strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::ServiceAccount => "serviceAccount",
            PrincipalKind::Group => "group",
            PrincipalKind::User => "user",
        }
    }

    /// Parse a kind from either the member prefix or a CLI target type.
    ///
    /// `ad_group` maps to `group`: directory groups are synced into the
    /// cloud identity as plain groups.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "serviceAccount" | "service_account" => Some(PrincipalKind::ServiceAccount),
            "group" | "ad_group" => Some(PrincipalKind::Group),
            "user" => Some(PrincipalKind::User),
            _ => None,
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated identity reference. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    kind: PrincipalKind,
    email: String,
}

impl Principal {
    /// Build a principal from a kind string and an email address.
    pub fn new(kind: &str, email: &str) -> ReconcileResult<Self> {
        let parsed = PrincipalKind::parse(kind).ok_or_else(|| ReconcileError::InvalidPrincipal {
            input: format!("{kind}:{email}"),
            reason: format!("unknown member type '{kind}'"),
        })?;
        Self::with_kind(parsed, email)
    }

    /// Build a principal from an already-known kind.
    pub fn with_kind(kind: PrincipalKind, email: &str) -> ReconcileResult<Self> {
        validate_email(email).map_err(|reason| ReconcileError::InvalidPrincipal {
            input: format!("{kind}:{email}"),
            reason,
        })?;
        Ok(Self {
            kind,
            email: email.to_string(),
        })
    }

    pub fn service_account(email: &str) -> ReconcileResult<Self> {
        Self::with_kind(PrincipalKind::ServiceAccount, email)
    }

    pub fn group(email: &str) -> ReconcileResult<Self> {
        Self::with_kind(PrincipalKind::Group, email)
    }

    pub fn user(email: &str) -> ReconcileResult<Self> {
        Self::with_kind(PrincipalKind::User, email)
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The member string as stored in a binding.
    pub fn member(&self) -> String {
        self.to_string()
    }
}

fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email is empty".to_string());
    }
    if email.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err("email contains whitespace or ':'".to_string());
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
                return Err(format!("'{domain}' is not a valid email domain"));
            }
            Ok(())
        }
        _ => Err("expected exactly one '@' between a local part and a domain".to_string()),
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.email)
    }
}

impl FromStr for Principal {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, email) = s
            .split_once(':')
            .ok_or_else(|| ReconcileError::InvalidPrincipal {
                input: s.to_string(),
                reason: "expected '<kind>:<email>'".to_string(),
            })?;
        Self::new(kind, email)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
