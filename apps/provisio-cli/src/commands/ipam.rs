//! IPAM reserve and release commands

use clap::{Args, Subcommand};
use ipnetwork::IpNetwork;
use tracing::info;

use provisio_core::address::{parse_cidr, DeleteOutcome, NetworkView};
use provisio_core::workflow::{
    AddressApplied, AddressDiff, AddressIntent, AddressPlan, Mode, Outcome, ReconcileWorkflow,
};

use super::Context;
use crate::error::CliResult;
use crate::output::report::{self, AddressOutcome};
use crate::output::GithubOutput;

/// Arguments for the ipam command
#[derive(Args, Debug)]
pub struct IpamArgs {
    #[command(subcommand)]
    pub command: IpamCommands,
}

#[derive(Subcommand, Debug)]
pub enum IpamCommands {
    /// Reserve the next free block of a given size
    Reserve(ReserveArgs),

    /// Delete a reservation matched by view, network and label
    Release(ReleaseArgs),
}

#[derive(Args, Debug)]
pub struct ReserveArgs {
    /// dry-run or apply
    #[arg(long)]
    pub mode: Mode,

    #[arg(long)]
    pub network_view: String,

    /// Parent block to allocate from, e.g. 10.0.0.0/16
    #[arg(long)]
    pub supernet: String,

    /// Size of the new block, e.g. 26
    #[arg(long)]
    pub prefix_length: u8,

    /// Free-text label stored with the reservation
    #[arg(long)]
    pub label: String,

    /// Site attribute value (defaults to infoblox.default_site_code)
    #[arg(long)]
    pub site_code: Option<String>,

    /// Append proposed_subnet=<cidr> to $GITHUB_OUTPUT
    #[arg(long)]
    pub github_output: bool,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// dry-run or apply
    #[arg(long)]
    pub mode: Mode,

    #[arg(long)]
    pub network_view: String,

    /// Exact network of the reservation, e.g. 10.0.1.0/26
    #[arg(long)]
    pub network: String,

    /// Label the reservation was created with
    #[arg(long)]
    pub label: String,

    /// Append released_subnet=<cidr> to $GITHUB_OUTPUT
    #[arg(long)]
    pub github_output: bool,
}

/// Execute the ipam command
pub async fn execute(args: IpamArgs, ctx: &Context) -> CliResult<()> {
    match args.command {
        IpamCommands::Reserve(reserve) => execute_reserve(reserve, ctx).await,
        IpamCommands::Release(release) => execute_release(release, ctx).await,
    }
}

async fn execute_reserve(args: ReserveArgs, ctx: &Context) -> CliResult<()> {
    let github = args.github_output.then(GithubOutput::from_env).transpose()?;

    let intent = AddressIntent::Reserve {
        view: NetworkView::new(args.network_view.trim())?,
        supernet: parse_cidr(&args.supernet)?,
        prefix_length: args.prefix_length,
        label: args.label,
        site_attribute: args
            .site_code
            .unwrap_or_else(|| ctx.config.infoblox.default_site_code.clone()),
    };
    info!(mode = %args.mode, "reserving address block");

    let outcome = run(intent, args.mode, ctx).await?;
    ctx.emit(&outcome, |p| report::address_report(p, &outcome))?;

    if let (Some(github), Some(network)) = (github, reserved_network(&outcome)) {
        github.append("proposed_subnet", &network.to_string())?;
    }
    Ok(())
}

async fn execute_release(args: ReleaseArgs, ctx: &Context) -> CliResult<()> {
    let github = args.github_output.then(GithubOutput::from_env).transpose()?;

    let intent = AddressIntent::Release {
        view: NetworkView::new(args.network_view.trim())?,
        network: parse_cidr(&args.network)?,
        label: args.label,
    };
    info!(mode = %args.mode, "releasing address block");

    let outcome = run(intent, args.mode, ctx).await?;
    ctx.emit(&outcome, |p| report::address_report(p, &outcome))?;

    if let (Some(github), Some(network)) = (github, released_network(&outcome)) {
        github.append("released_subnet", &network.to_string())?;
    }
    Ok(())
}

async fn run(intent: AddressIntent, mode: Mode, ctx: &Context) -> CliResult<AddressOutcome> {
    let diff = AddressDiff::new(
        ctx.address_store()?,
        intent,
        ctx.config.infoblox.address_settings(),
    )?;
    Ok(ReconcileWorkflow::new(diff, mode).run().await?)
}

/// The block a reserve run proposed (dry-run) or created (apply).
pub fn reserved_network(outcome: &AddressOutcome) -> Option<IpNetwork> {
    match outcome {
        Outcome::Planned {
            plan: AddressPlan::Reserve { proposed, .. },
        } => Some(proposed.network),
        Outcome::Applied {
            result: AddressApplied::Reserved { block },
            ..
        } => Some(block.network),
        _ => None,
    }
}

/// The block a release run actually deleted.
pub fn released_network(outcome: &AddressOutcome) -> Option<IpNetwork> {
    match outcome {
        Outcome::Applied {
            result:
                AddressApplied::Released {
                    block,
                    outcome: DeleteOutcome::Deleted,
                },
            ..
        } => Some(block.network),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::prelude::*;

    #[test]
    fn test_reserved_network_for_dry_run_reserve() {
        let proposed = AddressBlock {
            view: NetworkView::new("prod").unwrap(),
            network: parse_cidr("10.0.1.0/26").unwrap(),
            label: "team-x".to_string(),
            site_attribute: Some("GCP".to_string()),
            reference: None,
        };
        let outcome: AddressOutcome = Outcome::Planned {
            plan: AddressPlan::Reserve {
                parent: ParentBlock::Network {
                    network: parse_cidr("10.0.0.0/16").unwrap(),
                },
                utilization_percent: None,
                proposed,
            },
        };
        assert_eq!(reserved_network(&outcome), Some(parse_cidr("10.0.1.0/26").unwrap()));
        assert_eq!(released_network(&outcome), None);
    }

    #[test]
    fn test_no_network_for_no_change() {
        let outcome: AddressOutcome = Outcome::NoChange {
            mode: Mode::Apply,
            reason: "nothing to delete".to_string(),
        };
        assert_eq!(reserved_network(&outcome), None);
        assert_eq!(released_network(&outcome), None);
    }

    fn team_x_block() -> AddressBlock {
        AddressBlock {
            view: NetworkView::new("prod").unwrap(),
            network: parse_cidr("10.0.1.0/26").unwrap(),
            label: "team-x".to_string(),
            site_attribute: None,
            reference: Some(BlockRef::new("network/ZG5z:10.0.1.0/26/prod")),
        }
    }

    #[test]
    fn test_released_network_only_when_deleted() {
        let plan = AddressPlan::Release {
            block: team_x_block(),
        };

        let dry_run: AddressOutcome = Outcome::Planned { plan: plan.clone() };
        assert_eq!(released_network(&dry_run), None);

        let vanished: AddressOutcome = Outcome::Applied {
            plan: plan.clone(),
            result: AddressApplied::Released {
                block: team_x_block(),
                outcome: DeleteOutcome::NotFound,
            },
        };
        assert_eq!(released_network(&vanished), None);

        let deleted: AddressOutcome = Outcome::Applied {
            plan,
            result: AddressApplied::Released {
                block: team_x_block(),
                outcome: DeleteOutcome::Deleted,
            },
        };
        assert_eq!(released_network(&deleted), Some(parse_cidr("10.0.1.0/26").unwrap()));
    }
}
