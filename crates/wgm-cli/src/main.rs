//! wgm CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wgm_cli::cmd;
use wgm_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project = cli.project;

    match cli.command {
        Commands::Init { path } => cmd::init::init(&path),
        Commands::SyncRepo => cmd::sync_repo::sync_repo(&project),
        Commands::Sync { publisher, version } => {
            cmd::sync::sync(&project, &publisher, version.as_deref()).await
        }
        Commands::Refresh => cmd::refresh::refresh(&project).await,
        Commands::ValidateHash { output } => {
            if !cmd::validate::validate(&project, output)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Purge {
            target,
            version,
            yes,
        } => cmd::purge::purge(&project, &target, version.as_deref(), yes),
        Commands::PurgeAll { yes } => cmd::purge::purge_all(&project, yes),
        Commands::Search { target } => cmd::search::search(&project, &target),
        Commands::PatchRepo {
            server_url,
            patch_dir,
        } => cmd::patch::patch_repo(&project, server_url.as_deref(), patch_dir.as_deref()),
        Commands::Cleanup { dry_run } => cmd::cleanup::cleanup(&project, dry_run),
    }
}
