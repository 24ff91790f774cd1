//! Removal of downloaded versions from disk and state.

use crate::error::Result;
use crate::filter::PackageFilter;
use crate::paths::{Layout, patched_manifest_dir};
use crate::state::StateStore;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};
use wgm_schema::PackageId;

/// Packages in state selected by `filter`, in state order.
pub fn matching_downloads(state: &StateStore, filter: &PackageFilter) -> Vec<PackageId> {
    state
        .downloads
        .keys()
        .filter(|id| filter.matches_downloaded(id))
        .cloned()
        .collect()
}

/// Remove one version: its download directory, its patched manifests and its
/// state entry. Returns `false` if the version was not in state.
///
/// # Errors
///
/// Fails if a directory exists but cannot be removed. State is only
/// changed once both directories are gone.
pub fn purge_version(
    state: &mut StateStore,
    layout: &Layout,
    patch_root: &Path,
    id: &PackageId,
    version: &str,
) -> Result<bool> {
    if state.version(id, version).is_none() {
        return Ok(false);
    }

    let download_dir = layout.download_dir(id, version);
    remove_dir(&download_dir)?;
    prune_empty_parents(&download_dir, layout.downloads_dir());

    let patched = patched_manifest_dir(patch_root, id, version);
    remove_dir(&patched)?;
    prune_empty_parents(&patched, patch_root);

    state.remove_version(id, version);
    info!(package = %id, %version, "purged");
    Ok(true)
}

/// Remove every version of a package. Returns the versions removed.
///
/// # Errors
///
/// Stops at the first version whose directories cannot be removed.
pub fn purge_package(
    state: &mut StateStore,
    layout: &Layout,
    patch_root: &Path,
    id: &PackageId,
) -> Result<Vec<String>> {
    let versions: Vec<String> = state
        .package(id)
        .map(|p| p.versions.keys().cloned().collect())
        .unwrap_or_default();

    let mut removed = Vec::with_capacity(versions.len());
    for version in versions {
        if purge_version(state, layout, patch_root, id, &version)? {
            removed.push(version);
        }
    }
    Ok(removed)
}

/// Remove every package in state. Returns the number of versions removed.
///
/// # Errors
///
/// Stops at the first version whose directories cannot be removed.
pub fn purge_all(state: &mut StateStore, layout: &Layout, patch_root: &Path) -> Result<usize> {
    let ids: Vec<PackageId> = state.downloads.keys().cloned().collect();
    let mut count = 0;
    for id in &ids {
        count += purge_package(state, layout, patch_root, id)?.len();
    }
    Ok(count)
}

fn remove_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove now-empty directories between `path` and `stop` (exclusive).
fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // fails on non-empty directories, which ends the walk
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
