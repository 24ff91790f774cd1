//! Integrity verification of downloaded files against recorded checksums.

use crate::error::Result;
use crate::paths::Layout;
use crate::state::{StateStore, VersionEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use wgm_schema::{PackageId, Sha256Hash};

/// Outcome of hashing one recorded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    /// Content hash equals the recorded one.
    Match,
    /// Content changed since it was recorded.
    Mismatch,
}

/// Check result for a file present on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    /// Match or mismatch.
    pub status: FileStatus,
    /// Hash from state.
    pub expected: Sha256Hash,
    /// Hash of the content now on disk.
    pub computed: Sha256Hash,
}

/// Check results for one version directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    /// No mismatches and no missing files.
    pub valid: bool,
    /// Recorded files found on disk.
    pub files: BTreeMap<String, FileCheck>,
    /// Recorded files not found on disk.
    pub missing_files: Vec<String>,
    /// Files on disk that state does not know about. These do not affect
    /// `valid`.
    pub unexpected_files: Vec<String>,
    /// Files are recorded but the whole download directory is gone.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub directory_missing: bool,
}

impl VersionReport {
    fn empty() -> Self {
        Self {
            valid: true,
            files: BTreeMap::new(),
            missing_files: Vec::new(),
            unexpected_files: Vec::new(),
            directory_missing: false,
        }
    }

    /// Nothing recorded and nothing on disk.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.missing_files.is_empty() && self.unexpected_files.is_empty()
    }
}

/// Check results for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    /// Every version is valid.
    pub valid: bool,
    /// Set when the package could not be checked at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Version label to report.
    pub versions: BTreeMap<String, VersionReport>,
}

/// Result of `wgm validate-hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Every package is valid.
    pub all_valid: bool,
    /// Package id to report.
    pub packages: BTreeMap<String, PackageReport>,
}

/// Verify every recorded file of one package.
///
/// # Errors
///
/// Fails if a present file cannot be read.
pub fn verify_package(state: &StateStore, layout: &Layout, id: &PackageId) -> Result<PackageReport> {
    let Some(package) = state.package(id) else {
        return Ok(PackageReport {
            valid: false,
            error: Some("Package not in state".to_string()),
            versions: BTreeMap::new(),
        });
    };

    let mut versions = BTreeMap::new();
    for (version, entry) in &package.versions {
        let report = verify_version(&layout.download_dir(id, version), entry)?;
        versions.insert(version.clone(), report);
    }

    Ok(PackageReport {
        valid: versions.values().all(|v| v.valid),
        error: None,
        versions,
    })
}

/// Verify every package in state. An empty state is valid.
///
/// # Errors
///
/// Fails if a present file cannot be read.
pub fn verify_all(state: &StateStore, layout: &Layout) -> Result<ValidationReport> {
    let mut packages = BTreeMap::new();
    for id in state.downloads.keys() {
        packages.insert(id.to_string(), verify_package(state, layout, id)?);
    }
    Ok(ValidationReport {
        all_valid: packages.values().all(|p| p.valid),
        packages,
    })
}

fn verify_version(dir: &Path, entry: &VersionEntry) -> Result<VersionReport> {
    let mut report = VersionReport::empty();
    let on_disk = files_in(dir)?;

    if entry.files.is_empty() {
        report.unexpected_files = on_disk;
        return Ok(report);
    }

    if !dir.is_dir() {
        report.valid = false;
        report.directory_missing = true;
        report.missing_files = entry.files.keys().cloned().collect();
        return Ok(report);
    }

    for (filename, expected) in &entry.files {
        if !on_disk.contains(filename) {
            report.missing_files.push(filename.clone());
            report.valid = false;
            continue;
        }

        let computed = Sha256Hash::compute_file(&dir.join(filename))?;
        let status = if computed.matches(expected.as_str()) {
            FileStatus::Match
        } else {
            report.valid = false;
            FileStatus::Mismatch
        };
        report.files.insert(
            filename.clone(),
            FileCheck {
                status,
                expected: expected.clone(),
                computed,
            },
        );
    }

    report.unexpected_files = on_disk
        .into_iter()
        .filter(|name| !entry.files.contains_key(name))
        .collect();
    Ok(report)
}

/// Sorted names of regular files directly inside `dir`.
fn files_in(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
