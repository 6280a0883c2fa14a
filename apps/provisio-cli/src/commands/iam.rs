//! IAM grant and revoke commands

use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::info;

use provisio_connector_gcp::TerraformStateSource;
use provisio_core::policy::ResourceKey;
use provisio_core::principal::Principal;
use provisio_core::roles::{BundleCatalog, Role};
use provisio_core::traits::StateSource;
use provisio_core::workflow::{Mode, PolicyDiff, PolicyIntent, ReconcileWorkflow};

use super::Context;
use crate::error::{CliError, CliResult};
use crate::output::{print_warning, report};

/// Arguments for the iam command
#[derive(Args, Debug)]
pub struct IamArgs {
    #[command(subcommand)]
    pub command: IamCommands,
}

#[derive(Subcommand, Debug)]
pub enum IamCommands {
    /// Grant roles to a principal on a project
    Grant(GrantArgs),

    /// Remove a principal from one role on a project
    Revoke(RevokeArgs),
}

/// Which project to act on.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project ID
    #[arg(long, required_unless_present = "from_terraform", conflicts_with = "from_terraform")]
    pub project_id: Option<String>,

    /// Read the project ID from `terraform show -json`
    #[arg(long)]
    pub from_terraform: bool,

    /// Terraform working directory (overrides terraform.working_dir)
    #[arg(long, requires = "from_terraform")]
    pub terraform_dir: Option<PathBuf>,
}

/// Who receives or loses the grant.
#[derive(Args, Debug, Clone)]
pub struct PrincipalArgs {
    /// service_account, ad_group or user
    #[arg(long)]
    pub target_type: String,

    /// Email of the principal
    #[arg(long)]
    pub email: String,
}

impl PrincipalArgs {
    pub fn principal(&self) -> CliResult<Principal> {
        Ok(Principal::new(self.target_type.trim(), self.email.trim())?)
    }
}

#[derive(Args, Debug)]
pub struct GrantArgs {
    /// dry-run or apply
    #[arg(long)]
    pub mode: Mode,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub principal: PrincipalArgs,

    /// Comma separated roles, e.g. roles/viewer,roles/browser
    #[arg(long, default_value = "")]
    pub roles: String,

    /// Name of a role bundle to add (see `provisio bundles list`)
    #[arg(long)]
    pub bundled_roles: Option<String>,
}

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// dry-run or apply
    #[arg(long)]
    pub mode: Mode,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub principal: PrincipalArgs,

    /// Role to remove the principal from
    #[arg(long, default_value = "roles/owner")]
    pub role: String,
}

/// Execute the iam command
pub async fn execute(args: IamArgs, ctx: &Context) -> CliResult<()> {
    match args.command {
        IamCommands::Grant(grant) => execute_grant(grant, ctx).await,
        IamCommands::Revoke(revoke) => execute_revoke(revoke, ctx).await,
    }
}

async fn execute_grant(args: GrantArgs, ctx: &Context) -> CliResult<()> {
    let principal = args.principal.principal()?;
    let catalog = ctx.config.bundle_catalog()?;
    let roles = requested_roles(&args.roles, args.bundled_roles.as_deref(), &catalog)?;
    if roles.is_empty() {
        print_warning("no roles given via --roles or --bundled-roles; nothing will be granted");
    }
    let resource = resolve_project(&args.project, ctx).await?;

    info!(
        resource = %resource,
        principal = %principal,
        roles = roles.len(),
        mode = %args.mode,
        "granting roles"
    );

    let diff = PolicyDiff::new(
        ctx.policy_store()?,
        resource,
        PolicyIntent::Grant { principal, roles },
    );
    let outcome = ReconcileWorkflow::new(diff, args.mode).run().await?;
    ctx.emit(&outcome, |p| report::policy_report(p, &outcome))
}

async fn execute_revoke(args: RevokeArgs, ctx: &Context) -> CliResult<()> {
    let principal = args.principal.principal()?;
    let role = args.role.trim();
    if role.is_empty() {
        return Err(CliError::Validation("--role must not be empty".to_string()));
    }
    let resource = resolve_project(&args.project, ctx).await?;

    info!(resource = %resource, principal = %principal, role, mode = %args.mode, "revoking role");

    let diff = PolicyDiff::new(
        ctx.policy_store()?,
        resource,
        PolicyIntent::Revoke {
            principal,
            role: Role::new(role),
        },
    );
    let outcome = ReconcileWorkflow::new(diff, args.mode).run().await?;
    ctx.emit(&outcome, |p| report::policy_report(p, &outcome))
}

/// Explicit roles first, then the bundle's, without duplicates.
pub fn requested_roles(
    roles: &str,
    bundle: Option<&str>,
    catalog: &BundleCatalog,
) -> CliResult<Vec<Role>> {
    let mut merged = Role::parse_list(roles);
    if let Some(name) = bundle.map(str::trim).filter(|n| !n.is_empty()) {
        for role in catalog.resolve(name)? {
            if !merged.contains(&role) {
                merged.push(role);
            }
        }
    }
    Ok(merged)
}

async fn resolve_project(args: &ProjectArgs, ctx: &Context) -> CliResult<ResourceKey> {
    if let Some(ref id) = args.project_id {
        let id = id.trim();
        if id.is_empty() {
            return Err(CliError::Validation("--project-id must not be empty".to_string()));
        }
        return Ok(ResourceKey::project(id));
    }

    let mut terraform = ctx.config.terraform.clone();
    if let Some(ref dir) = args.terraform_dir {
        terraform.working_dir = dir.clone();
    }
    let source = TerraformStateSource::new(terraform);
    let project_id = source.lookup("google_project", "project_id").await?;
    info!(project_id = %project_id, "project resolved from terraform state");
    Ok(ResourceKey::project(&project_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::error::ReconcileError;

    #[test]
    fn test_requested_roles_merges_without_duplicates() {
        let catalog = BundleCatalog::builtin();
        let roles = requested_roles(
            "roles/storage.admin, roles/viewer",
            Some("GenAIUser"),
            &catalog,
        )
        .unwrap();

        assert_eq!(roles[0], Role::new("roles/storage.admin"));
        assert_eq!(roles[1], Role::new("roles/viewer"));
        assert_eq!(
            roles.iter().filter(|r| r.as_str() == "roles/storage.admin").count(),
            1
        );
        assert!(roles.contains(&Role::new("roles/aiplatform.user")));
    }

    #[test]
    fn test_requested_roles_empty_is_allowed() {
        let roles = requested_roles("", None, &BundleCatalog::builtin()).unwrap();
        assert!(roles.is_empty());
    }

    #[test]
    fn test_unknown_bundle_fails() {
        let err = requested_roles("", Some("no-such-bundle"), &BundleCatalog::builtin()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Reconcile(ReconcileError::UnknownBundle { .. })
        ));
    }

    #[test]
    fn test_principal_args_map_ad_group() {
        let args = PrincipalArgs {
            target_type: "ad_group".to_string(),
            email: "data-team@example.com".to_string(),
        };
        assert_eq!(args.principal().unwrap().member(), "group:data-team@example.com");
    }
}
