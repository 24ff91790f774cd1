//! Typed view of the YAML manifests found in the upstream repository.
//!
//! Only the fields the mirror acts on are modelled; everything else in the
//! document is ignored on read and left untouched on disk.

use crate::types::{Architecture, InstallerRecord};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Errors raised while reading a manifest file.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for a manifest.
    #[error("Failed to parse manifest {path}: {source}")]
    Yaml {
        /// Manifest path.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Declared `ManifestType` of a manifest document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManifestType {
    /// Top-level version manifest.
    Version,
    /// Installer manifest carrying the `Installers` list.
    Installer,
    /// Default locale metadata.
    DefaultLocale,
    /// Additional locale metadata.
    Locale,
    /// Single-file manifest holding everything.
    Singleton,
    /// Merged manifest.
    Merged,
    /// Unrecognised type.
    #[serde(other)]
    Unknown,
}

/// An entry of the `Installers` list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallerEntry {
    /// Declared architecture (`x64`, `x86`, `arm64`, `neutral`, ...).
    pub architecture: Option<String>,
    /// Download URL.
    pub installer_url: Option<String>,
    /// Declared SHA-256 of the installer.
    #[serde(default, deserialize_with = "scalar_string")]
    pub installer_sha256: Option<String>,
}

impl From<&InstallerEntry> for InstallerRecord {
    fn from(entry: &InstallerEntry) -> Self {
        Self {
            architecture: entry.architecture.as_deref().map(Architecture::from),
            url: entry.installer_url.clone(),
            expected_sha256: entry.installer_sha256.clone(),
        }
    }
}

/// A parsed manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestDocument {
    /// `Publisher.Package` identifier.
    pub package_identifier: Option<String>,
    /// Declared type; absent in some hand-written manifests.
    pub manifest_type: Option<ManifestType>,
    /// Installer entries, in document order.
    #[serde(default)]
    pub installers: Vec<InstallerEntry>,
}

impl ManifestDocument {
    /// Parse a manifest from YAML text.
    ///
    /// # Errors
    ///
    /// Returns the parser error if the text is not a manifest mapping.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] or [`ManifestError::Yaml`] with the path attached.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ManifestError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether this document is an installer manifest.
    pub fn is_installer(&self) -> bool {
        self.manifest_type == Some(ManifestType::Installer)
    }

    /// Installer records in document order.
    pub fn installer_records(&self) -> Vec<InstallerRecord> {
        self.installers.iter().map(InstallerRecord::from).collect()
    }
}

/// Accept any YAML scalar as a string. A digest made only of digits would
/// otherwise load as a number.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
