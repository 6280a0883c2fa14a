//! Roles and role bundles
//!
//! A bundle is a named, statically enumerated set of roles. The table is
//! built once at process start and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ReconcileError, ReconcileResult};

/// An opaque role identifier (e.g. `roles/viewer`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma separated role list, skipping blank entries.
    pub fn parse_list(raw: &str) -> Vec<Role> {
        raw.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Role::new)
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::new(value)
    }
}

/// Built-in job-function bundles.
const BUILTIN_BUNDLES: &[(&str, &[&str])] = &[
    (
        "GenAIUser",
        &[
            "roles/artifactregistry.admin",
            "roles/aiplatform.user",
            "roles/notebooks.admin",
            "roles/storage.admin",
            "roles/bigquery.dataEditor",
            "roles/bigquery.jobUser",
            "roles/dlp.admin",
        ],
    ),
    (
        "GenAIViewer",
        &[
            "roles/aiplatform.viewer",
            "roles/bigquery.dataViewer",
            "roles/storage.objectViewer",
            "roles/notebooks.viewer",
            "roles/dlp.jobsReader",
        ],
    ),
    ("GenAIFeatureStoreUser", &["roles/aiplatform.featurestoreUser"]),
    (
        "GenAIFeatureStoreViewer",
        &[
            "roles/aiplatform.featurestoreDataViewer",
            "roles/aiplatform.featurestoreResourceViewer",
        ],
    ),
    ("GenAppBuilderUser", &["roles/discoveryengine.editor"]),
];

/// Immutable bundle table (member role resolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleCatalog {
    bundles: BTreeMap<String, Vec<Role>>,
}

impl BundleCatalog {
    /// Catalog with the built-in bundles only.
    pub fn builtin() -> Self {
        let bundles = BUILTIN_BUNDLES
            .iter()
            .map(|(name, roles)| {
                (
                    (*name).to_string(),
                    roles.iter().map(|r| Role::new(*r)).collect(),
                )
            })
            .collect();
        Self { bundles }
    }

    /// Built-in catalog with extra or overriding bundles merged in.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> ReconcileResult<Self> {
        let mut catalog = Self::builtin();
        for (name, roles) in overrides {
            if name.trim().is_empty() {
                return Err(ReconcileError::Configuration {
                    message: "bundle names must not be blank".to_string(),
                });
            }
            if roles.iter().all(|r| r.trim().is_empty()) {
                return Err(ReconcileError::Configuration {
                    message: format!("bundle '{name}' has no roles"),
                });
            }
            let roles = roles
                .iter()
                .map(|r| r.trim())
                .filter(|r| !r.is_empty())
                .map(Role::new)
                .collect();
            catalog.bundles.insert(name.clone(), roles);
        }
        Ok(catalog)
    }

    /// Expand a bundle name into its roles, in table order, without duplicates.
    ///
    /// Names must match exactly; there is no prefix or case-insensitive match.
    pub fn resolve(&self, name: &str) -> ReconcileResult<Vec<Role>> {
        let roles = self
            .bundles
            .get(name)
            .ok_or_else(|| ReconcileError::UnknownBundle {
                name: name.to_string(),
            })?;

        let mut seen = std::collections::HashSet::new();
        Ok(roles
            .iter()
            .filter(|r| seen.insert(r.as_str()))
            .cloned()
            .collect())
    }

    /// Iterate bundle names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }
}

impl Default for BundleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
