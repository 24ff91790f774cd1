//! Purge commands

use crate::ui::{Output, confirm};
use anyhow::Result;
use std::path::Path;
use wgm_core::PackageFilter;

/// Remove downloaded versions of packages matching `target`.
pub fn purge(project: &Path, target: &str, version: Option<&str>, yes: bool) -> Result<()> {
    let mut mirror = super::open(project)?;
    let output = Output::new();
    let filter = PackageFilter::parse(target);

    let ids = mirror.matching_downloads(&filter);
    if ids.is_empty() {
        output.info(&format!("No downloaded packages match '{target}'"));
        return Ok(());
    }

    if !yes {
        for id in &ids {
            output.info(&id.to_string());
        }
        let what = version.map_or_else(|| "all versions".to_string(), |v| format!("version {v}"));
        if !confirm(&format!("Purge {what} of {} package(s)?", ids.len()))? {
            output.error("Operation cancelled");
            return Ok(());
        }
    }

    let removed = mirror.purge(&filter, version)?;
    for (id, v) in &removed {
        output.success(&format!("Purged {id} {v}"));
    }
    output.summary(&format!("Purged {} version(s)", removed.len()));
    Ok(())
}

/// Remove every downloaded package.
pub fn purge_all(project: &Path, yes: bool) -> Result<()> {
    let mut mirror = super::open(project)?;
    let output = Output::new();

    let packages = mirror.state().downloads.len();
    if packages == 0 {
        output.info("No downloaded packages.");
        return Ok(());
    }
    if !yes && !confirm(&format!("This will purge all {packages} downloaded package(s). Continue?"))? {
        output.error("Operation cancelled");
        return Ok(());
    }

    let count = mirror.purge_all()?;
    output.summary(&format!("Purged {count} version(s) of {packages} package(s)"));
    Ok(())
}
