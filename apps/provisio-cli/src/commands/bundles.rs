//! Role bundle inspection

use clap::{Args, Subcommand};
use serde::Serialize;

use provisio_core::roles::{BundleCatalog, Role};

use super::Context;
use crate::error::CliResult;

/// Arguments for the bundles command
#[derive(Args, Debug)]
pub struct BundlesArgs {
    #[command(subcommand)]
    pub command: BundlesCommands,
}

#[derive(Subcommand, Debug)]
pub enum BundlesCommands {
    /// List bundle names
    List,

    /// Show the roles of one bundle
    Show {
        /// Bundle name (exact match)
        name: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BundleView {
    pub name: String,
    pub roles: Vec<Role>,
}

/// Every bundle in name order.
pub fn list(catalog: &BundleCatalog) -> CliResult<Vec<BundleView>> {
    catalog
        .names()
        .map(|name| show(catalog, name))
        .collect()
}

pub fn show(catalog: &BundleCatalog, name: &str) -> CliResult<BundleView> {
    Ok(BundleView {
        name: name.to_string(),
        roles: catalog.resolve(name)?,
    })
}

/// Execute the bundles command
pub fn execute(args: BundlesArgs, ctx: &Context) -> CliResult<()> {
    let catalog = ctx.config.bundle_catalog()?;
    match args.command {
        BundlesCommands::List => {
            let bundles = list(&catalog)?;
            ctx.emit(&bundles, |p| {
                for bundle in &bundles {
                    p.key_value(&bundle.name, &format!("{} role(s)", bundle.roles.len()))?;
                }
                Ok(())
            })
        }
        BundlesCommands::Show { name } => {
            let bundle = show(&catalog, &name)?;
            ctx.emit(&bundle, |p| {
                p.header(&bundle.name)?;
                for role in &bundle.roles {
                    p.line(&format!("  {role}"))?;
                }
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_list_is_sorted_and_includes_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("AAA".to_string(), vec!["roles/viewer".to_string()]);
        let catalog = BundleCatalog::with_overrides(&overrides).unwrap();

        let bundles = list(&catalog).unwrap();
        assert_eq!(bundles[0].name, "AAA");
        assert!(bundles.iter().any(|b| b.name == "GenAIViewer"));
    }

    #[test]
    fn test_show_unknown_bundle() {
        assert!(show(&BundleCatalog::builtin(), "genaiuser").is_err());
    }
}
