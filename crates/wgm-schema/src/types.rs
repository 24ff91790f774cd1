//! Package identities and installer selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `publisher.package` identity.
///
/// The publisher is everything before the first `.`; the package name keeps
/// any further dots. Serializes as the joined string so it can key JSON maps.
///
/// # Example
///
/// ```
/// use wgm_schema::PackageId;
///
/// let id = PackageId::parse("Microsoft.VisualStudio.Code").unwrap();
/// assert_eq!(id.publisher(), "Microsoft");
/// assert_eq!(id.package(), "VisualStudio.Code");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    publisher: String,
    package: String,
}

/// Errors produced when parsing a [`PackageId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageIdError {
    /// No `.` separates publisher and package.
    #[error("Invalid package id '{0}': expected 'Publisher.Package'")]
    MissingSeparator(String),

    /// Either side of the separator is empty.
    #[error("Invalid package id '{0}': publisher and package must be non-empty")]
    EmptyComponent(String),
}

impl PackageId {
    /// Build an identity from its two components.
    ///
    /// # Errors
    ///
    /// Returns [`PackageIdError::EmptyComponent`] if either part is empty.
    pub fn new(publisher: impl Into<String>, package: impl Into<String>) -> Result<Self, PackageIdError> {
        let publisher = publisher.into();
        let package = package.into();
        if publisher.is_empty() || package.is_empty() {
            return Err(PackageIdError::EmptyComponent(format!("{publisher}.{package}")));
        }
        Ok(Self { publisher, package })
    }

    /// Parse `publisher.package`, splitting on the first `.`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no separator or a component is empty.
    pub fn parse(s: &str) -> Result<Self, PackageIdError> {
        let (publisher, package) = s
            .split_once('.')
            .ok_or_else(|| PackageIdError::MissingSeparator(s.to_string()))?;
        Self::new(publisher, package)
    }

    /// Publisher namespace (e.g. `Microsoft`).
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Package name within the publisher (e.g. `Teams`).
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Lowercase first character of the publisher, the top-level shard of
    /// the manifest tree.
    pub fn shard(&self) -> String {
        self.publisher
            .chars()
            .next()
            .map(|c| c.to_lowercase().collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.publisher, self.package)
    }
}

impl TryFrom<String> for PackageId {
    type Error = PackageIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.to_string()
    }
}

/// CPU architecture declared by an installer entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 64-bit x86.
    X64,
    /// 32-bit x86.
    X86,
    /// 64-bit ARM.
    Arm64,
    /// 32-bit ARM.
    Arm,
    /// Architecture independent.
    Neutral,
    /// Anything the manifest declares that we do not recognise.
    Other(String),
}

impl From<&str> for Architecture {
    fn from(s: &str) -> Self {
        match s {
            "x64" => Self::X64,
            "x86" => Self::X86,
            "arm64" => Self::Arm64,
            "arm" => Self::Arm,
            "neutral" => Self::Neutral,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
            Self::Arm => "arm",
            Self::Neutral => "neutral",
            Self::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// One installer entry of a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerRecord {
    /// Declared architecture; `None` when the manifest omits it.
    pub architecture: Option<Architecture>,
    /// Download URL, if the entry has one.
    pub url: Option<String>,
    /// SHA-256 declared by the manifest, as written (any case).
    pub expected_sha256: Option<String>,
}

impl InstallerRecord {
    /// An entry is eligible when its architecture matches and its URL names a file.
    fn is_eligible(&self, arch: &Architecture) -> bool {
        self.architecture.as_ref() == Some(arch)
            && self.url.as_deref().is_some_and(|u| !filename_from_url(u).is_empty())
    }
}

/// Pick the installer to mirror: the first `x64` entry whose URL names a file,
/// otherwise the first such `x86` entry.
pub fn select_installer(installers: &[InstallerRecord]) -> Option<&InstallerRecord> {
    [Architecture::X64, Architecture::X86]
        .iter()
        .find_map(|arch| installers.iter().find(|i| i.is_eligible(arch)))
}

/// Extract the file name a URL downloads to: the last path segment, with any
/// query string or fragment removed.
///
/// # Example
///
/// ```
/// use wgm_schema::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/foo/Bar-1.2.3.exe"), "Bar-1.2.3.exe");
/// assert_eq!(filename_from_url("https://example.com/setup.msi?sig=abc"), "setup.msi");
/// assert_eq!(filename_from_url("https://example.com/dir/"), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].split('/').next_back().unwrap_or("")
}
