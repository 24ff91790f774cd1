//! Shared types for wgm: package identities, installer records, version
//! ordering, content hashes and the manifest documents read from the
//! upstream repository.

pub mod hash;
pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use hash::Sha256Hash;
pub use manifest::{ManifestDocument, ManifestError, ManifestType};
pub use types::*;
pub use version::{VersionKey, parse_order_key, resolve};
