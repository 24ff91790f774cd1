//! Cleanup command (retention policy)

use crate::ui::Output;
use anyhow::Result;
use chrono::Utc;
use std::path::Path;

/// Remove unpinned versions beyond the configured count or age.
pub fn cleanup(project: &Path, dry_run: bool) -> Result<()> {
    let mut mirror = super::open(project)?;
    let output = Output::new();

    let policy = &mirror.config().cleanup;
    output.info(&format!(
        "Keeping at most {} unpinned version(s), none older than {} month(s)",
        policy.max_unpinned_versions, policy.max_unpinned_age_months
    ));

    let items = mirror.cleanup(Utc::now(), dry_run)?;
    for item in &items {
        if dry_run {
            output.info(&format!("[DRY RUN] Would clean {} {}", item.id, item.version));
        } else if item.removed {
            output.success(&format!("Cleaned {} {}", item.id, item.version));
        }
    }

    if dry_run {
        output.summary("Dry run complete, no changes made.");
    } else {
        let removed = items.iter().filter(|i| i.removed).count();
        output.summary(&format!("Cleanup removed {removed} version(s)"));
    }
    Ok(())
}
