//! Core engine for wgm: download orchestration, persisted state, integrity
//! checks, retention and manifest patching for a package mirror.

pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod mirror;
pub mod patch;
pub mod paths;
pub mod purge;
pub mod repo;
pub mod retention;
pub mod search;
pub mod source;
pub mod state;
pub mod verify;

pub use config::{CleanupPolicy, Config, InitOutcome, init_project};
pub use download::{DownloadOutcome, Downloader, Skip};
pub use error::{MirrorError, Result};
pub use fetch::{BlobFetcher, FetchError, HttpFetcher};
pub use filter::PackageFilter;
pub use mirror::{CleanupItem, Mirror, RefreshAction, RefreshSummary, SyncSummary};
pub use paths::*;
pub use source::{FsManifestSource, ManifestSource};
pub use state::{PackageState, StateStore, VersionEntry};
pub use verify::{FileStatus, ValidationReport};

/// User Agent string for downloads
pub const USER_AGENT: &str = concat!("wgm/", env!("CARGO_PKG_VERSION"));
