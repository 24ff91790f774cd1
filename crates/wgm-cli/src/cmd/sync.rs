//! Sync command: download packages matching a filter

use crate::ui::Output;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use wgm_core::{DownloadOutcome, HttpFetcher, PackageFilter};

/// Download the latest version (or `version`) of every matching package.
pub async fn sync(project: &Path, target: &str, version: Option<&str>) -> Result<()> {
    let mut mirror = super::open(project)?;
    let source = mirror.manifest_source()?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let output = Output::new();

    let filter = PackageFilter::parse(target);
    let summary = mirror
        .sync_matching(&source, &fetcher, &filter, version, Utc::now())
        .await?;

    if summary.packages.is_empty() {
        output.warning(&format!("No packages found matching '{target}'"));
    }
    for result in &summary.packages {
        report(&output, &result.id.to_string(), &result.outcome);
    }

    output.summary(&format!(
        "Downloaded {} package(s) matching '{target}'",
        summary.updated()
    ));
    Ok(())
}

/// One status line for a package's download outcome.
pub(crate) fn report(output: &Output, id: &str, outcome: &wgm_core::Result<DownloadOutcome>) {
    match outcome {
        Ok(DownloadOutcome::Downloaded {
            version,
            filename,
            checksum_mismatch,
            ..
        }) => {
            output.success(&format!("{id} {version}: downloaded {filename}"));
            if *checksum_mismatch {
                output.warning(&format!(
                    "{id} {version}: checksum differs from manifest, recorded computed hash"
                ));
            }
        }
        Ok(DownloadOutcome::AlreadyPresent {
            version,
            repaired,
            checksum_mismatch,
            ..
        }) => {
            if *repaired {
                output.info(&format!("{id} {version}: recorded checksum of existing file"));
                if *checksum_mismatch {
                    output.warning(&format!(
                        "{id} {version}: existing file differs from manifest checksum"
                    ));
                }
            } else {
                output.info(&format!("{id} {version}: up to date"));
            }
        }
        Ok(DownloadOutcome::Skipped(reason)) => output.warning(&format!("{id}: skipped, {reason}")),
        Err(e) => output.error(&format!("{id}: {e}")),
    }
}
