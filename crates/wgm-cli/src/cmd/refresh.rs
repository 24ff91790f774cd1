//! Refresh command

use crate::ui::Output;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use wgm_core::{HttpFetcher, RefreshAction};

/// Update every package holding unpinned versions to its latest version.
pub async fn refresh(project: &Path) -> Result<()> {
    let mut mirror = super::open(project)?;
    let source = mirror.manifest_source()?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let output = Output::new();

    let summary = mirror.refresh_unpinned(&source, &fetcher, Utc::now()).await?;

    for (id, action) in &summary.packages {
        match action {
            RefreshAction::OnlyPinned => {
                output.info(&format!("{id} has only pinned versions, skipping"));
            }
            RefreshAction::UpToDate { current } => {
                output.info(&format!("{id} is up to date ({current})"));
            }
            RefreshAction::Refreshed { from, outcome } => {
                output.info(&format!("{id}: updating from {from}"));
                super::sync::report(&output, &id.to_string(), outcome);
            }
        }
    }

    output.summary(&format!("Refreshed {} package(s)", summary.updated()));
    Ok(())
}
