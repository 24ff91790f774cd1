//! Repository sync command

use crate::ui::Output;
use anyhow::{Context, Result};
use std::path::Path;
use wgm_core::repo::SyncKind;

/// Clone or update the sparse manifest checkout.
pub fn sync_repo(project: &Path) -> Result<()> {
    let mirror = super::open(project)?;
    let output = Output::new();
    let config = mirror.config();

    if !mirror.repository().exists() {
        output.warning("Initial clone may take several minutes.");
    }
    output.info(&format!("Syncing {} at {}", config.repo_url, config.revision));

    let kind = mirror.sync_repo().context("Failed to sync repository")?;
    let verb = match kind {
        SyncKind::Cloned => "Cloned",
        SyncKind::Updated => "Updated",
    };
    let head = mirror.repository().head_revision()?.unwrap_or_default();
    output.success(&format!(
        "{verb} repository at {} ({head})",
        mirror.layout().mirror_dir().display()
    ));
    Ok(())
}
