//! Read-modify-write workflow
//!
//! Every run walks the same phases: fetch, compute delta, then either report
//! (dry-run) or apply through the domain's guard. Any failure stops the run;
//! there are no automatic retries.

mod address;
mod policy;

pub use address::{AddressApplied, AddressDiff, AddressIntent, AddressPlan, AddressSettings, AddressSnapshot};
pub use policy::{PolicyDiff, PolicyIntent, PolicyPlan};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, info_span, warn, Instrument};

use crate::error::{ReconcileError, ReconcileResult};

/// Whether mutations are performed. Fixed for the whole invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    DryRun,
    Apply,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::DryRun => "dry-run",
            Mode::Apply => "apply",
        }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Mode::Apply)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry-run" | "dryrun" | "dry_run" => Ok(Mode::DryRun),
            "apply" => Ok(Mode::Apply),
            other => Err(ReconcileError::invalid_input(format!(
                "unknown mode '{other}' (expected dry-run or apply)"
            ))),
        }
    }
}

/// Workflow phase, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    ComputeDelta,
    DryRunReport,
    GuardedApply,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::ComputeDelta => "compute_delta",
            Phase::DryRunReport => "dry_run_report",
            Phase::GuardedApply => "guarded_apply",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the compute phase decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta<P> {
    /// Current state already satisfies the intent.
    NoChange { reason: String },
    /// A mutation is needed.
    Change(P),
}

/// Domain half of the workflow: how to fetch, diff and apply.
///
/// `apply` must route the mutation through the domain's guard (the
/// concurrency guard for policies, the allocator/matcher for addresses).
#[async_trait]
pub trait DiffComputer: Send + Sync {
    /// State observed by the fetch phase.
    type Snapshot: Send + Sync;
    /// Proposed mutation.
    type Plan: Serialize + Send + Sync;
    /// Result of the applied mutation.
    type Applied: Serialize + Send;

    /// Short domain name for logs (`policy`, `address`).
    fn domain(&self) -> &'static str;

    async fn fetch(&self) -> ReconcileResult<Self::Snapshot>;

    async fn compute(&self, snapshot: &Self::Snapshot) -> ReconcileResult<Delta<Self::Plan>>;

    async fn apply(
        &self,
        snapshot: &Self::Snapshot,
        plan: &Self::Plan,
    ) -> ReconcileResult<Self::Applied>;
}

/// Terminal result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<P, A> {
    /// Nothing to do; no mutation was attempted.
    NoChange { mode: Mode, reason: String },
    /// Dry-run: the mutation that would have been made.
    Planned { plan: P },
    /// Apply: the mutation and what the store returned.
    Applied { plan: P, result: A },
}

impl<P, A> Outcome<P, A> {
    pub fn is_no_change(&self) -> bool {
        matches!(self, Outcome::NoChange { .. })
    }

    pub fn plan(&self) -> Option<&P> {
        match self {
            Outcome::NoChange { .. } => None,
            Outcome::Planned { plan } | Outcome::Applied { plan, .. } => Some(plan),
        }
    }
}

/// Drives a [`DiffComputer`] through the phases in a fixed mode.
pub struct ReconcileWorkflow<D> {
    computer: D,
    mode: Mode,
}

impl<D: DiffComputer> ReconcileWorkflow<D> {
    pub fn new(computer: D, mode: Mode) -> Self {
        Self { computer, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn computer(&self) -> &D {
        &self.computer
    }

    /// Run the workflow once.
    ///
    /// In dry-run mode no mutating store call is ever made, whatever the
    /// computed delta.
    pub async fn run(&self) -> ReconcileResult<Outcome<D::Plan, D::Applied>> {
        let span = info_span!(
            "reconcile",
            domain = self.computer.domain(),
            mode = %self.mode
        );
        async {
            let mut phase = Phase::Fetch;
            let result = self.run_phases(&mut phase).await;
            match &result {
                Ok(_) => info!(phase = %Phase::Done, "reconcile finished"),
                Err(e) => warn!(
                    phase = %Phase::Failed,
                    failed_in = %phase,
                    error_code = e.error_code(),
                    "reconcile failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self, phase: &mut Phase) -> ReconcileResult<Outcome<D::Plan, D::Applied>> {
        info!(phase = %phase, "fetching current state");
        let snapshot = self.computer.fetch().await?;

        *phase = Phase::ComputeDelta;
        let plan = match self.computer.compute(&snapshot).await? {
            Delta::NoChange { reason } => {
                info!(phase = %phase, %reason, "no change needed");
                return Ok(Outcome::NoChange {
                    mode: self.mode,
                    reason,
                });
            }
            Delta::Change(plan) => plan,
        };

        match self.mode {
            Mode::DryRun => {
                *phase = Phase::DryRunReport;
                info!(phase = %phase, "dry-run; not applying");
                Ok(Outcome::Planned { plan })
            }
            Mode::Apply => {
                *phase = Phase::GuardedApply;
                info!(phase = %phase, "applying");
                let result = self.computer.apply(&snapshot, &plan).await?;
                Ok(Outcome::Applied { plan, result })
            }
        }
    }
}
