//! Project configuration (`config.json`) and project initialization.

use crate::error::{MirrorError, Result};
use crate::paths::{CONFIG_FILE, STATE_FILE};
use crate::state::StateStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Retention thresholds for unpinned versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Unpinned versions kept per package, highest first.
    pub max_unpinned_versions: usize,
    /// Unpinned versions older than this many calendar months are removed.
    pub max_unpinned_age_months: u32,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            max_unpinned_versions: 5,
            max_unpinned_age_months: 6,
        }
    }
}

/// Contents of `config.json`. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream manifest repository.
    pub repo_url: String,
    /// Branch, tag or commit to check out.
    pub revision: String,
    /// Checkout directory, relative to the project root.
    pub mirror_dir: String,
    /// Patched manifest output, relative to the project root.
    pub patch_dir: String,
    /// Base URL the mirror is served from.
    pub server_url: String,
    /// Retention thresholds applied by `wgm cleanup`.
    pub cleanup: CleanupPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/microsoft/winget-pkgs".to_string(),
            revision: "master".to_string(),
            mirror_dir: "mirror".to_string(),
            patch_dir: "patched-manifests".to_string(),
            server_url: "https://localhost/winget".to_string(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl Config {
    /// Load `config.json`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::NotInitialized`] if the file is absent, otherwise I/O
    /// or JSON errors.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_project_file(path, CONFIG_FILE)?;
        serde_json::from_str(&text).map_err(|source| MirrorError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `config.json` atomically.
    ///
    /// # Errors
    ///
    /// I/O or serialization errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        crate::state::write_json_atomic(path, self)
    }
}

pub(crate) fn read_project_file(path: &Path, file: &'static str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MirrorError::NotInitialized {
            path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Result of [`init_project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A fresh project was written at this root.
    Created(PathBuf),
    /// A `config.json` already existed; nothing was touched.
    AlreadyInitialized(PathBuf),
}

impl InitOutcome {
    /// Absolute project root.
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::AlreadyInitialized(p) => p,
        }
    }
}

/// Create the project directory with a default `config.json` and an empty
/// `state.json`. Does nothing if a config already exists.
///
/// # Errors
///
/// Fails if the directory or either file cannot be written.
pub fn init_project(path: &Path) -> Result<InitOutcome> {
    let root = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    std::fs::create_dir_all(&root)?;

    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        info!(path = %root.display(), "project already initialized");
        return Ok(InitOutcome::AlreadyInitialized(root));
    }

    Config::default().save(&config_path)?;
    StateStore::new(&root).save(&root.join(STATE_FILE))?;
    info!(path = %root.display(), "initialized project");

    Ok(InitOutcome::Created(root))
}
