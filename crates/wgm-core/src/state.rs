//! Persisted download state (`state.json`).
//!
//! The store is loaded once per operation, mutated in memory and written
//! back as a whole. Writes go to a temporary file in the same directory and
//! are renamed over the old file, so a crash leaves either the previous or
//! the new state on disk.

use crate::config::read_project_file;
use crate::error::{MirrorError, Result};
use crate::paths::STATE_FILE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use wgm_schema::{PackageId, Sha256Hash};

/// One downloaded (or repaired) version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Upstream repository revision the version was fetched at.
    #[serde(default)]
    pub git_rev: Option<String>,
    /// File name to SHA-256 of the content on disk.
    #[serde(default)]
    pub files: BTreeMap<String, Sha256Hash>,
    /// Last time the entry was written.
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    /// Explicitly requested; exempt from retention.
    #[serde(default)]
    pub pinned: bool,
}

/// All versions held for a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    /// Version label to entry.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionEntry>,
    /// Last time any version of the package was written.
    #[serde(
        default,
        with = "iso8601::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Metadata applied when a file is recorded.
#[derive(Debug, Clone)]
pub struct RecordContext {
    /// The version was requested explicitly.
    pub pinned: bool,
    /// Repository revision of the manifests used.
    pub git_rev: Option<String>,
    /// Write time.
    pub now: DateTime<Utc>,
}

/// Contents of `state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStore {
    /// Project root the state belongs to.
    pub path: PathBuf,
    /// End of the last completed batch operation.
    #[serde(default, with = "iso8601::option")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Per-package download records.
    #[serde(default)]
    pub downloads: BTreeMap<PackageId, PackageState>,
}

impl StateStore {
    /// Empty state for the project at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.to_path_buf(),
            last_sync: None,
            downloads: BTreeMap::new(),
        }
    }

    /// Load `state.json`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::NotInitialized`] if the file is absent, otherwise I/O
    /// or JSON errors.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_project_file(path, STATE_FILE)?;
        serde_json::from_str(&text).map_err(|source| MirrorError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overwrite `path` with the full state.
    ///
    /// # Errors
    ///
    /// I/O or serialization errors. The previous file is left intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Everything recorded for a package.
    pub fn package(&self, id: &PackageId) -> Option<&PackageState> {
        self.downloads.get(id)
    }

    /// The entry for one version of a package.
    pub fn version(&self, id: &PackageId, version: &str) -> Option<&VersionEntry> {
        self.downloads.get(id)?.versions.get(version)
    }

    /// Recorded hash for `(package, version, filename)`, the idempotency key
    /// of a download.
    pub fn recorded_hash(&self, id: &PackageId, version: &str, filename: &str) -> Option<&Sha256Hash> {
        self.version(id, version)?.files.get(filename)
    }

    /// Insert or update the entry for `version` and record `filename`.
    ///
    /// An existing pin is kept: a later unpinned write does not clear it.
    pub fn record_file(
        &mut self,
        id: &PackageId,
        version: &str,
        filename: &str,
        sha256: Sha256Hash,
        ctx: RecordContext,
    ) {
        let package = self.downloads.entry(id.clone()).or_default();
        let entry = package
            .versions
            .entry(version.to_string())
            .or_insert_with(|| VersionEntry {
                git_rev: None,
                files: BTreeMap::new(),
                timestamp: ctx.now,
                pinned: false,
            });

        entry.files.insert(filename.to_string(), sha256);
        entry.pinned |= ctx.pinned;
        entry.timestamp = ctx.now;
        if ctx.git_rev.is_some() {
            entry.git_rev = ctx.git_rev;
        }
        package.timestamp = Some(ctx.now);
    }

    /// Drop a version entry; a package left without versions is removed too.
    pub fn remove_version(&mut self, id: &PackageId, version: &str) -> Option<VersionEntry> {
        let package = self.downloads.get_mut(id)?;
        let removed = package.versions.remove(version);
        if package.versions.is_empty() {
            self.downloads.remove(id);
        }
        removed
    }

    /// Stamp the end of a batch operation.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.last_sync = Some(now);
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| MirrorError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MirrorError::Io(e.error))?;
    Ok(())
}

/// ISO-8601 timestamps. Written as RFC 3339 in UTC; naive timestamps (no
/// offset) are accepted on read and taken as UTC.
pub(crate) mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub(crate) fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
    }

    pub(crate) mod option {
        use super::parse;
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub(crate) fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => parse(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'"))),
                None => Ok(None),
            }
        }
    }
}
