//! Manifest source: the read side of the upstream repository snapshot.

use crate::error::Result;
use crate::filter::PackageFilter;
use crate::paths::manifest_tree_dir;
use std::path::{Path, PathBuf};
use tracing::debug;
use wgm_schema::{InstallerRecord, ManifestDocument, PackageId};

/// Read interface over a repository snapshot.
pub trait ManifestSource {
    /// Version labels available for a package, or `None` if the package does
    /// not exist. Labels are sorted by name so resolution is reproducible.
    ///
    /// # Errors
    ///
    /// Fails if the package directory cannot be listed.
    fn versions(&self, id: &PackageId) -> Result<Option<Vec<String>>>;

    /// Installer records for a version, or `None` if it has no manifest.
    ///
    /// # Errors
    ///
    /// Fails if the manifest exists but cannot be read or parsed.
    fn installers(&self, id: &PackageId, version: &str) -> Result<Option<Vec<InstallerRecord>>>;

    /// Current upstream revision, if known.
    fn revision(&self) -> Option<String>;
}

/// Manifest tree on the local filesystem:
/// `{root}/{shard}/{publisher}/{package}/{version}/*.yaml`.
#[derive(Debug, Clone)]
pub struct FsManifestSource {
    root: PathBuf,
    revision: Option<String>,
}

impl FsManifestSource {
    /// Source rooted at a `manifests` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            revision: None,
        }
    }

    /// Attach the checkout's revision, recorded with every download.
    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// The `manifests` directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publishers whose directory name starts with the filter's publisher
    /// (case-insensitive), sorted.
    ///
    /// # Errors
    ///
    /// Fails if the shard directory cannot be listed.
    pub fn matching_publishers(&self, filter: &PackageFilter) -> Result<Vec<String>> {
        let Some(shard) = filter.shard() else {
            return Ok(Vec::new());
        };
        let names = subdirectories(&self.root.join(shard))?;
        Ok(names
            .into_iter()
            .filter(|name| filter.matches_publisher(name))
            .collect())
    }

    /// Package names under a publisher, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the publisher directory cannot be listed.
    pub fn packages_of(&self, publisher: &str) -> Result<Vec<String>> {
        let shard: String = publisher
            .chars()
            .next()
            .map(|c| c.to_lowercase().collect())
            .unwrap_or_default();
        subdirectories(&self.root.join(shard).join(publisher))
    }

    /// Packages selected by a filter.
    ///
    /// Without a package part every package of every matching publisher is
    /// returned. With one, package names are matched by case-insensitive
    /// prefix, or exactly (ignoring case) when `exact_package` is set, in
    /// which case the publisher is taken as written.
    ///
    /// # Errors
    ///
    /// Fails on unreadable directories.
    pub fn discover(&self, filter: &PackageFilter, exact_package: bool) -> Result<Vec<PackageId>> {
        let publishers = if exact_package && filter.package().is_some() {
            vec![filter.publisher().to_string()]
        } else {
            self.matching_publishers(filter)?
        };

        let mut found = Vec::new();
        for publisher in publishers {
            for package in self.packages_of(&publisher)? {
                let selected = if exact_package {
                    filter.matches_package_exact(&package)
                } else {
                    filter.matches_package_prefix(&package)
                };
                if selected {
                    found.push(PackageId::new(publisher.clone(), package)?);
                }
            }
        }
        Ok(found)
    }
}

impl ManifestSource for FsManifestSource {
    fn versions(&self, id: &PackageId) -> Result<Option<Vec<String>>> {
        let dir = manifest_tree_dir(&self.root, id);
        if !dir.is_dir() {
            return Ok(None);
        }
        subdirectories(&dir).map(Some)
    }

    fn installers(&self, id: &PackageId, version: &str) -> Result<Option<Vec<InstallerRecord>>> {
        let dir = manifest_tree_dir(&self.root, id).join(version);
        let installer_manifest = dir.join(format!("{id}.installer.yaml"));
        let general_manifest = dir.join(format!("{id}.yaml"));

        for path in [installer_manifest, general_manifest] {
            if path.is_file() {
                debug!(path = %path.display(), "reading installers");
                let doc = ManifestDocument::load(&path)?;
                return Ok(Some(doc.installer_records()));
            }
        }
        Ok(None)
    }

    fn revision(&self) -> Option<String> {
        self.revision.clone()
    }
}

/// Sorted names of the directories directly under `dir`; empty if `dir`
/// does not exist.
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
