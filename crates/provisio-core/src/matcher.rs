//! Exact reservation lookup for deletion.

use ipnetwork::IpNetwork;
use serde::Serialize;
use tracing::debug;

use crate::address::{AddressBlock, NetworkQuery, NetworkView};
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::AddressStore;

/// Result of an exact lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchOutcome {
    Found(AddressBlock),
    NotFound,
}

/// Finds the single reservation matching (view, network, label).
///
/// Matching is exact on all three. Zero matches is not an error; two or
/// more is `Ambiguous` and nothing may be picked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReservationMatcher;

impl ReservationMatcher {
    /// Filter store results down to exact matches.
    ///
    /// The store query may be looser than the triple (substring comment
    /// search, for example), so the candidates are checked again here.
    pub fn select_exact(
        candidates: Vec<AddressBlock>,
        view: &NetworkView,
        network: &IpNetwork,
        label: &str,
    ) -> ReconcileResult<MatchOutcome> {
        let mut matches: Vec<AddressBlock> = candidates
            .into_iter()
            .filter(|b| b.matches(view, network, label))
            .collect();

        match matches.len() {
            0 => Ok(MatchOutcome::NotFound),
            1 => Ok(MatchOutcome::Found(matches.remove(0))),
            count => Err(ReconcileError::Ambiguous {
                view: view.to_string(),
                network: network.to_string(),
                label: label.to_string(),
                count,
            }),
        }
    }

    /// Query the store and select the exact match.
    pub async fn find_exact<S>(
        store: &S,
        view: &NetworkView,
        network: IpNetwork,
        label: &str,
    ) -> ReconcileResult<MatchOutcome>
    where
        S: AddressStore + ?Sized,
    {
        let candidates = store
            .query_networks(&NetworkQuery::exact(view, network, label))
            .await?;
        debug!(view = %view, network = %network, candidates = candidates.len(), "reservation query");
        Self::select_exact(candidates, view, &network, label)
    }
}
