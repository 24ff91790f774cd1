//! wgm - selective package mirror
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Mirrors a subset of an upstream manifest repository, downloads the
//! installers those manifests reference and republishes the manifests with
//! URLs pointing at the mirror.
//!
//! # Project Layout
//!
//! ```text
//! <project>/
//! ├── config.json          # repo URL, revision, directories, retention
//! ├── state.json           # what has been downloaded, pinned, verified
//! ├── mirror/manifests/    # sparse checkout of the upstream repository
//! ├── downloads/           # {publisher}/{package}/{version}/{file}
//! └── patched-manifests/   # manifests rewritten to point at the mirror
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "wgm")]
#[command(author, version, about = "wgm - selective mirror for a package manifest repository")]
pub struct Cli {
    /// Project directory holding config.json and state.json
    #[arg(long, global = true, env = "WGM_PROJECT", default_value = ".")]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a project with default config and empty state
    Init {
        /// Project directory to create
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Clone or update the manifest repository checkout
    #[command(name = "sync-repo")]
    SyncRepo,
    /// Download packages matching a filter
    Sync {
        /// Publisher prefix, or Publisher/Package prefix
        publisher: String,
        /// Download this exact version (pins it)
        #[arg(long)]
        version: Option<String>,
    },
    /// Update packages with unpinned versions to the latest version
    Refresh,
    /// Verify downloaded files against recorded checksums
    #[command(name = "validate-hash")]
    ValidateHash {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Remove downloaded versions of matching packages
    Purge {
        /// Publisher prefix, or exact Publisher/Package
        target: String,
        /// Remove only this version
        #[arg(long)]
        version: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Remove every downloaded package
    #[command(name = "purge-all")]
    PurgeAll {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List repository packages with their download status
    Search {
        /// Publisher prefix, or exact Publisher/Package
        target: String,
    },
    /// Write manifests with installer URLs pointing at the mirror
    #[command(name = "patch-repo")]
    PatchRepo {
        /// Base URL the mirror is served from (defaults to config)
        #[arg(long)]
        server_url: Option<String>,
        /// Output directory (defaults to config)
        #[arg(long)]
        patch_dir: Option<PathBuf>,
    },
    /// Remove old unpinned versions per the retention policy
    Cleanup {
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
