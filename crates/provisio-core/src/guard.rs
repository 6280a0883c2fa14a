//! Optimistic concurrency guard for policy writes.

use tracing::{debug, warn};

use crate::error::{ReconcileError, ReconcileResult};
use crate::policy::{ConcurrencyToken, PolicyDocument, ResourceKey};
use crate::traits::PolicyStore;

/// Rejects a write when the token read at fetch time no longer matches.
///
/// Conflicts are surfaced to the caller; the guard never retries and never
/// overwrites.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyGuard;

impl ConcurrencyGuard {
    /// Write `document` only if the store still holds `expected`.
    ///
    /// Stores with a conditional-write primitive enforce the check
    /// themselves. For the others the guard re-fetches and compares the
    /// token immediately before writing; that leaves a small window the
    /// store cannot close for us.
    pub async fn checked_apply<S>(
        store: &S,
        resource: &ResourceKey,
        document: &PolicyDocument,
        expected: Option<&ConcurrencyToken>,
    ) -> ReconcileResult<PolicyDocument>
    where
        S: PolicyStore + ?Sized,
    {
        let expected = expected
            .filter(|t| !t.is_blank())
            .ok_or_else(|| ReconcileError::MissingToken {
                resource: resource.to_string(),
            })?;

        document.validate()?;

        let mut payload = document.clone();
        payload.etag = Some(expected.clone());

        if !store.supports_conditional_write() {
            let current = store.fetch(resource).await?;
            match current.etag {
                Some(ref observed) if observed == expected => {
                    debug!(resource = %resource, "token unchanged since fetch");
                }
                observed => {
                    let observed = observed.map_or_else(|| "<none>".to_string(), |t| t.to_string());
                    warn!(
                        resource = %resource,
                        expected = %expected,
                        observed = %observed,
                        "policy changed since it was read"
                    );
                    return Err(ReconcileError::Conflict {
                        resource: resource.to_string(),
                        expected: expected.to_string(),
                        observed,
                    });
                }
            }
        }

        store.write(resource, &payload).await
    }
}
