use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{cache::CacheCommand, check::CheckCommand, patch::PatchCommand};

#[derive(Parser)]
#[command(name = "bundlepatch")]
#[command(about = "Download and update labelled content bundles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(clap::Args, Clone)]
pub struct GlobalArgs {
    /// Directory to search for bundlepatch.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Use a different location for bundlepatch's data, where downloaded bundles are kept
    #[arg(long, global = true)]
    pub datadir: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check, confirm and download the configured labels
    #[command(alias = "update")]
    Patch(PatchCommand),

    /// Show how much would be downloaded, without downloading
    #[command(alias = "size")]
    Check(CheckCommand),

    /// Manage the bundle cache
    Cache(CacheCommand),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Patch(cmd) => cmd.run(self.global_args).await,
            Commands::Check(cmd) => cmd.run(self.global_args).await,
            Commands::Cache(cmd) => cmd.run(self.global_args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_patch_arguments() {
        let cli = Cli::try_parse_from(["bundlepatch", "patch", "--yes", "core", "levels"]).unwrap();
        match cli.command {
            Commands::Patch(cmd) => {
                assert!(cmd.yes);
                assert_eq!(cmd.session.labels, vec!["core", "levels"]);
                assert_eq!(cmd.session.catalog, None);
            }
            _ => panic!("expected patch command"),
        }
    }

    #[test]
    fn test_global_arguments_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bundlepatch",
            "check",
            "--catalog",
            "catalog.json",
            "--datadir",
            "/tmp/data",
            "-v",
        ])
        .unwrap();
        assert!(cli.global_args.verbose);
        assert_eq!(
            cli.global_args.datadir.as_deref(),
            Some(std::path::Path::new("/tmp/data"))
        );
    }
}
