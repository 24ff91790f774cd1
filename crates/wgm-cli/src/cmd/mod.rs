//! Command implementations, one module per subcommand.

pub mod cleanup;
pub mod init;
pub mod patch;
pub mod purge;
pub mod refresh;
pub mod search;
pub mod sync;
pub mod sync_repo;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use wgm_core::Mirror;

/// Open the project, failing before any work if it is not initialized.
pub(crate) fn open(project: &Path) -> Result<Mirror> {
    Mirror::open(project).with_context(|| format!("Failed to open project at {}", project.display()))
}
