//! Workflow outcome reports

use serde::Serialize;
use std::io::{self, Write};

use provisio_core::address::{AddressBlock, DeleteOutcome};
use provisio_core::policy::PolicyDocument;
use provisio_core::workflow::{AddressApplied, AddressPlan, Outcome, PolicyPlan};

use super::printer::Printer;
use crate::error::CliResult;

pub type PolicyOutcome = Outcome<PolicyPlan, PolicyDocument>;
pub type AddressOutcome = Outcome<AddressPlan, AddressApplied>;

/// Write any outcome as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(mut out: W, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn policy_report<W: Write>(p: &mut Printer<W>, outcome: &PolicyOutcome) -> io::Result<()> {
    match outcome {
        Outcome::NoChange { mode, reason } => p.info(&format!("No change ({mode}): {reason}")),
        Outcome::Planned { plan } => {
            p.header(&format!("Dry run: {}", plan.resource))?;
            policy_summary(p, plan)?;
            p.line("")?;
            p.line("Proposed policy:")?;
            p.line(&plan.proposed.to_json_pretty())?;
            p.line("")?;
            p.info("Re-run with --mode apply to write this policy.")
        }
        Outcome::Applied { plan, result } => {
            policy_summary(p, plan)?;
            if let Some(ref etag) = result.etag {
                p.key_value("New etag", etag.as_str())?;
            }
            p.success(&format!(
                "Applied {} change(s) to {}",
                plan.delta.len(),
                plan.resource
            ))
        }
    }
}

fn policy_summary<W: Write>(p: &mut Printer<W>, plan: &PolicyPlan) -> io::Result<()> {
    p.key_value("Resource", plan.resource.as_str())?;
    p.key_value("Principal", &plan.principal.member())?;
    p.key_value("Expected etag", plan.expected_token.as_str())?;
    p.line("  Changes:")?;
    for change in &plan.delta.changes {
        p.line(&format!("    {change}"))?;
    }
    Ok(())
}

pub fn address_report<W: Write>(p: &mut Printer<W>, outcome: &AddressOutcome) -> io::Result<()> {
    match outcome {
        Outcome::NoChange { mode, reason } => p.info(&format!("Nothing to do ({mode}): {reason}")),
        Outcome::Planned {
            plan:
                AddressPlan::Reserve {
                    parent,
                    utilization_percent,
                    proposed,
                },
        } => {
            p.header("Dry run: reservation")?;
            p.key_value("Parent", &parent.to_string())?;
            if let Some(used) = utilization_percent {
                p.key_value("Parent utilization", &format!("{used:.1}%"))?;
            }
            block_summary(p, proposed)?;
            p.line("")?;
            p.info("The block is not held until --mode apply creates it.")
        }
        Outcome::Planned {
            plan: AddressPlan::Release { block },
        } => {
            p.header("Dry run: release")?;
            block_summary(p, block)?;
            p.line("")?;
            p.info("Re-run with --mode apply to delete it.")
        }
        Outcome::Applied {
            result: AddressApplied::Reserved { block },
            ..
        } => {
            block_summary(p, block)?;
            p.success(&format!("Reserved {} in view {}", block.network, block.view))
        }
        Outcome::Applied {
            result: AddressApplied::Released { block, outcome },
            ..
        } => {
            block_summary(p, block)?;
            match outcome {
                DeleteOutcome::Deleted => {
                    p.success(&format!("Released {} in view {}", block.network, block.view))
                }
                DeleteOutcome::NotFound => p.info(&format!(
                    "{} was already gone from view {}; nothing to delete",
                    block.network, block.view
                )),
            }
        }
    }
}

fn block_summary<W: Write>(p: &mut Printer<W>, block: &AddressBlock) -> io::Result<()> {
    p.key_value("View", block.view.as_str())?;
    p.key_value("Network", &block.network.to_string())?;
    p.key_value("Label", &block.label)?;
    if let Some(ref site) = block.site_attribute {
        p.key_value("Site", site)?;
    }
    if let Some(ref reference) = block.reference {
        p.key_value("Ref", reference.as_str())?;
    }
    Ok(())
}
