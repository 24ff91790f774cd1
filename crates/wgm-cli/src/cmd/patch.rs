//! Manifest patching command

use crate::ui::Output;
use anyhow::Result;
use std::path::Path;

/// Write manifests pointing at the mirror for every downloaded version.
pub fn patch_repo(project: &Path, server_url: Option<&str>, patch_dir: Option<&Path>) -> Result<()> {
    let mirror = super::open(project)?;
    let output = Output::new();

    if mirror.state().downloads.is_empty() {
        output.info("No downloaded packages found in state. Run 'wgm sync' first.");
        return Ok(());
    }

    let (dir, report) = mirror.patch_repo(server_url, patch_dir)?;
    for (id, version) in &report.missing {
        output.warning(&format!("Source manifests not found for {id} {version}"));
    }
    output.summary(&format!(
        "Patched {} package version(s), {} installer URL(s), into {}",
        report.patched,
        report.rewritten_urls,
        dir.display()
    ));
    Ok(())
}
