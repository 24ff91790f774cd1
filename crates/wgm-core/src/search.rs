//! Repository search annotated with local download status.

use crate::error::Result;
use crate::filter::PackageFilter;
use crate::paths::Layout;
use crate::source::FsManifestSource;
use crate::state::StateStore;
use chrono::{DateTime, Utc};
use std::fmt;
use wgm_schema::PackageId;
use wgm_schema::version::sort_ascending;

/// Local status of a package or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    /// Nothing held.
    NotDownloaded,
    /// In state, but nothing on disk.
    Recorded,
    /// In state with files on disk.
    Downloaded,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotDownloaded => "Not downloaded",
            Self::Recorded => "Recorded",
            Self::Downloaded => "Downloaded",
        })
    }
}

/// One line of search output: a package, or one held version of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    /// Package identity.
    pub id: PackageId,
    /// Local status.
    pub status: PackageStatus,
    /// Held version; `None` for packages not downloaded.
    pub version: Option<String>,
    /// The version is pinned.
    pub pinned: bool,
    /// When the version was last written.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Packages in the repository matching `filter` (publisher prefix, or exact
/// package name when given), with one row per version held in state.
///
/// # Errors
///
/// Fails on unreadable repository directories.
pub fn search(
    source: &FsManifestSource,
    state: &StateStore,
    layout: &Layout,
    filter: &PackageFilter,
) -> Result<Vec<SearchRow>> {
    let mut ids = source.discover(filter, true)?;
    ids.sort_by_cached_key(ToString::to_string);

    let mut rows = Vec::new();
    for id in ids {
        rows.extend(rows_for(state, layout, &id));
    }
    Ok(rows)
}

/// Status rows for a single package.
pub fn rows_for(state: &StateStore, layout: &Layout, id: &PackageId) -> Vec<SearchRow> {
    let Some(package) = state.package(id).filter(|p| !p.versions.is_empty()) else {
        return vec![SearchRow {
            id: id.clone(),
            status: PackageStatus::NotDownloaded,
            version: None,
            pinned: false,
            timestamp: None,
        }];
    };

    let mut versions: Vec<String> = package.versions.keys().cloned().collect();
    sort_ascending(&mut versions);

    versions
        .into_iter()
        .filter_map(|version| {
            let entry = package.versions.get(&version)?;
            let status = if has_files(&layout.download_dir(id, &version)) {
                PackageStatus::Downloaded
            } else {
                PackageStatus::Recorded
            };
            Some(SearchRow {
                id: id.clone(),
                status,
                pinned: entry.pinned,
                timestamp: Some(entry.timestamp),
                version: Some(version),
            })
        })
        .collect()
}

fn has_files(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}
