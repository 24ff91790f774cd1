//! On-disk layout of a mirror project.

use crate::config::Config;
use std::path::{Path, PathBuf};
use wgm_schema::PackageId;

/// Project configuration file name.
pub const CONFIG_FILE: &str = "config.json";
/// Project state file name.
pub const STATE_FILE: &str = "state.json";
/// Download tree, relative to the project root.
pub const DOWNLOADS_DIR: &str = "downloads";
/// Manifest tree, relative to a repository checkout or patch output.
pub const MANIFESTS_DIR: &str = "manifests";

/// Resolved on-disk layout of a mirror project.
///
/// ```text
/// <root>/
/// ├── config.json
/// ├── state.json
/// ├── downloads/{publisher}/{package}/{version}/{file}
/// ├── <mirror_dir>/manifests/{shard}/{publisher}/{package}/{version}/
/// └── <patch_dir>/manifests/{shard}/{publisher}/{package}/{version}/
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    mirror_dir: PathBuf,
    downloads_dir: PathBuf,
    patch_dir: PathBuf,
}

impl Layout {
    /// Layout for the project at `root` with the directories named in `config`.
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            mirror_dir: root.join(&config.mirror_dir),
            downloads_dir: root.join(DOWNLOADS_DIR),
            patch_dir: root.join(&config.patch_dir),
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// `<root>/state.json`
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Repository checkout: `<root>/<mirror_dir>`
    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    /// `<root>/<mirror_dir>/manifests`
    pub fn manifests_dir(&self) -> PathBuf {
        self.mirror_dir.join(MANIFESTS_DIR)
    }

    /// `<root>/downloads`
    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Default patch output: `<root>/<patch_dir>`
    pub fn patch_dir(&self) -> &Path {
        &self.patch_dir
    }

    /// Source manifests for one version.
    pub fn manifest_dir(&self, id: &PackageId, version: &str) -> PathBuf {
        manifest_tree_dir(&self.manifests_dir(), id).join(version)
    }

    /// Download directory for one version.
    pub fn download_dir(&self, id: &PackageId, version: &str) -> PathBuf {
        self.downloads_dir
            .join(id.publisher())
            .join(id.package())
            .join(version)
    }

    /// Resolve a user-supplied patch directory against the project root.
    pub fn resolve_patch_dir(&self, dir: Option<&Path>) -> PathBuf {
        match dir {
            Some(d) if d.is_absolute() => d.to_path_buf(),
            Some(d) => self.root.join(d),
            None => self.patch_dir.clone(),
        }
    }
}

/// `{manifests}/{shard}/{publisher}/{package}`
pub fn manifest_tree_dir(manifests: &Path, id: &PackageId) -> PathBuf {
    manifests
        .join(id.shard())
        .join(id.publisher())
        .join(id.package())
}

/// Patched manifests for one version: `{patch_root}/manifests/{shard}/{publisher}/{package}/{version}`
pub fn patched_manifest_dir(patch_root: &Path, id: &PackageId, version: &str) -> PathBuf {
    manifest_tree_dir(&patch_root.join(MANIFESTS_DIR), id).join(version)
}
