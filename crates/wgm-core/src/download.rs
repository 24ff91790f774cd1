//! Download orchestration for a single package.
//!
//! Resolves the target version, selects the installer, decides whether a
//! transfer is needed and records the result in [`StateStore`]. Files are
//! streamed into a temporary file next to their destination while being
//! hashed, and only moved into place once the transfer completes. The
//! recorded checksum is always the hash of what landed on disk.

use crate::error::Result;
use crate::fetch::{BlobFetcher, ByteStream, FetchError};
use crate::paths::Layout;
use crate::source::ManifestSource;
use crate::state::{RecordContext, StateStore};
use chrono::Utc;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use wgm_schema::version::{is_resolvable, resolve};
use wgm_schema::{PackageId, Sha256Hash, filename_from_url, select_installer};

/// Reasons a package is skipped without failing the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// The manifest repository has no directory for the package.
    #[error("package directory not found")]
    PackageNotFound,

    /// None of the version directories could be resolved.
    #[error("no usable versions")]
    NoVersions,

    /// The explicitly requested version does not exist.
    #[error("requested version {requested} not found")]
    RequestedVersionNotFound {
        /// Version asked for by the caller.
        requested: String,
    },

    /// The version directory holds no installer manifest.
    #[error("no manifest for version {version}")]
    ManifestMissing {
        /// Version that was looked up.
        version: String,
    },

    /// No `x64` or `x86` entry has a URL naming a file.
    #[error("no x64/x86 installer with URL in version {version}")]
    NoEligibleInstaller {
        /// Version whose installers were inspected.
        version: String,
    },

    /// The transfer could not be started or broke off.
    #[error("download of {url} failed: {message}")]
    TransportFailure {
        /// Installer URL.
        url: String,
        /// Transport error text.
        message: String,
    },
}

/// Result of [`Downloader::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was fetched by this call.
    Downloaded {
        /// Resolved version.
        version: String,
        /// File name inside the version's download directory.
        filename: String,
        /// Hash of the bytes written.
        sha256: Sha256Hash,
        /// The manifest declared a different checksum.
        checksum_mismatch: bool,
    },
    /// The file was already on disk.
    AlreadyPresent {
        /// Resolved version.
        version: String,
        /// File name inside the version's download directory.
        filename: String,
        /// Its checksum had not been recorded yet and was computed now.
        repaired: bool,
        /// The computed checksum differs from the one the manifest declares.
        /// Only checked when `repaired` is set.
        checksum_mismatch: bool,
    },
    /// Nothing was downloaded or recorded.
    Skipped(Skip),
}

impl DownloadOutcome {
    /// True only when new content was downloaded.
    pub fn updated(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }

    /// The resolved version, unless the package was skipped.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Downloaded { version, .. } | Self::AlreadyPresent { version, .. } => Some(version),
            Self::Skipped(_) => None,
        }
    }
}

/// Couples a manifest source, a blob fetcher and the project layout.
#[derive(Debug)]
pub struct Downloader<'a, S, F> {
    source: &'a S,
    fetcher: &'a F,
    layout: &'a Layout,
}

impl<'a, S: ManifestSource, F: BlobFetcher> Downloader<'a, S, F> {
    /// Borrow the collaborators for one or more downloads.
    pub fn new(source: &'a S, fetcher: &'a F, layout: &'a Layout) -> Self {
        Self {
            source,
            fetcher,
            layout,
        }
    }

    /// Make sure the installer of `id` at `explicit_version` (or the latest
    /// version) is on disk and recorded.
    ///
    /// # Errors
    ///
    /// Only unreadable manifests and local I/O failures are errors; every
    /// other reason not to download is a [`DownloadOutcome::Skipped`].
    pub async fn download(
        &self,
        state: &mut StateStore,
        id: &PackageId,
        explicit_version: Option<&str>,
    ) -> Result<DownloadOutcome> {
        let Some(available) = self.source.versions(id)? else {
            return Ok(skip(id, Skip::PackageNotFound));
        };
        let available: Vec<String> = available.into_iter().filter(|v| is_resolvable(v)).collect();

        let target = match explicit_version {
            Some(requested) => {
                if !available.iter().any(|v| v == requested) {
                    return Ok(skip(
                        id,
                        Skip::RequestedVersionNotFound {
                            requested: requested.to_string(),
                        },
                    ));
                }
                requested.to_string()
            }
            None => match resolve(available.iter().map(String::as_str)) {
                Some(latest) => latest.to_string(),
                None => return Ok(skip(id, Skip::NoVersions)),
            },
        };

        let Some(installers) = self.source.installers(id, &target)? else {
            return Ok(skip(id, Skip::ManifestMissing { version: target }));
        };

        // selection only accepts URLs that name a file
        let chosen = select_installer(&installers).and_then(|i| Some((i.url.clone()?, i.expected_sha256.clone())));
        let Some((url, expected)) = chosen else {
            return Ok(skip(id, Skip::NoEligibleInstaller { version: target }));
        };
        let filename = filename_from_url(&url).to_string();

        let ctx = RecordContext {
            pinned: explicit_version.is_some(),
            git_rev: self.source.revision(),
            now: Utc::now(),
        };
        let dir = self.layout.download_dir(id, &target);
        let dest = dir.join(&filename);

        if tokio::fs::try_exists(&dest).await? {
            let (sha256, repaired) = match state.recorded_hash(id, &target, &filename) {
                Some(hash) => (hash.clone(), false),
                None => {
                    let path = dest.clone();
                    let hash = tokio::task::spawn_blocking(move || Sha256Hash::compute_file(&path))
                        .await
                        .map_err(std::io::Error::other)??;
                    (hash, true)
                }
            };
            let checksum_mismatch = if repaired {
                info!(package = %id, version = %target, file = %filename, "recorded checksum of existing file");
                declared_mismatch(id, &target, &dest, expected.as_deref(), &sha256)
            } else {
                debug!(package = %id, version = %target, "already up to date");
                false
            };
            state.record_file(id, &target, &filename, sha256, ctx);
            return Ok(DownloadOutcome::AlreadyPresent {
                version: target,
                filename,
                repaired,
                checksum_mismatch,
            });
        }

        info!(package = %id, version = %target, %url, "downloading");
        let stream = match self.fetcher.fetch(&url).await {
            Ok(stream) => stream,
            Err(e) => return Ok(transport_failure(id, url, &e)),
        };

        tokio::fs::create_dir_all(&dir).await?;
        let sha256 = match write_stream(stream, &dir, &dest).await {
            Ok(hash) => hash,
            Err(WriteError::Fetch(e)) => return Ok(transport_failure(id, url, &e)),
            Err(WriteError::Io(e)) => return Err(e.into()),
        };

        let checksum_mismatch = declared_mismatch(id, &target, &dest, expected.as_deref(), &sha256);
        state.record_file(id, &target, &filename, sha256.clone(), ctx);
        Ok(DownloadOutcome::Downloaded {
            version: target,
            filename,
            sha256,
            checksum_mismatch,
        })
    }
}

/// Compare against the manifest's declared checksum, warning on a difference.
fn declared_mismatch(
    id: &PackageId,
    version: &str,
    dest: &Path,
    expected: Option<&str>,
    computed: &Sha256Hash,
) -> bool {
    let Some(expected) = expected.filter(|exp| !computed.matches(exp)) else {
        return false;
    };
    warn!(
        package = %id,
        %version,
        file = %dest.display(),
        expected,
        computed = %computed,
        "checksum mismatch; recording computed hash"
    );
    true
}

fn skip(id: &PackageId, reason: Skip) -> DownloadOutcome {
    warn!(package = %id, %reason, "skipping");
    DownloadOutcome::Skipped(reason)
}

fn transport_failure(id: &PackageId, url: String, err: &FetchError) -> DownloadOutcome {
    skip(
        id,
        Skip::TransportFailure {
            url,
            message: err.to_string(),
        },
    )
}

enum WriteError {
    Fetch(FetchError),
    Io(std::io::Error),
}

/// Stream a blob into a temporary file in `dir`, hashing as it goes, then
/// rename it to `dest`. `dest` never holds a partial transfer; the temporary
/// file is deleted when this returns early or is dropped mid-transfer.
async fn write_stream(mut stream: ByteStream, dir: &Path, dest: &Path) -> Result<Sha256Hash, WriteError> {
    let (file, part): (_, TempPath) = tempfile::Builder::new()
        .prefix(".wgm-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(WriteError::Io)?
        .into_parts();
    let mut file = File::from_std(file);
    let mut hasher = Sha256::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(WriteError::Fetch)?;
        file.write_all(&chunk).await.map_err(WriteError::Io)?;
        hasher.update(&chunk);
    }
    file.flush().await.map_err(WriteError::Io)?;
    file.sync_all().await.map_err(WriteError::Io)?;
    drop(file);

    part.persist(dest).map_err(|e| WriteError::Io(e.error))?;
    Ok(Sha256Hash::from_hasher(hasher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::source::FsManifestSource;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves fixed bodies and counts requests.
    #[derive(Default)]
    struct StaticFetcher {
        bodies: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
        fail_mid_stream: bool,
    }

    #[async_trait]
    impl BlobFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let body = self
                .bodies
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("404 for {url}")))?;
            let mut chunks: Vec<Result<Bytes, FetchError>> = vec![Ok(Bytes::from(body))];
            if self.fail_mid_stream {
                chunks.push(Err(FetchError::Transport("connection reset".into())));
            }
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    struct Fixture {
        _dir: TempDir,
        layout: Layout,
        source: FsManifestSource,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), &Config::default());
        let source = FsManifestSource::new(layout.manifests_dir()).with_revision(Some("rev1".into()));
        Fixture {
            _dir: dir,
            layout,
            source,
        }
    }

    fn add_version(f: &Fixture, version: &str, installers: &str) {
        let id = PackageId::parse("Foo.Bar").unwrap();
        let dir = f.layout.manifest_dir(&id, version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Foo.Bar.yaml"), "ManifestType: version\n").unwrap();
        std::fs::write(
            dir.join("Foo.Bar.installer.yaml"),
            format!("ManifestType: installer\nInstallers:\n{installers}"),
        )
        .unwrap();
    }

    fn x64(url: &str, sha: Option<&str>) -> String {
        let mut s = format!("- Architecture: x64\n  InstallerUrl: {url}\n");
        if let Some(sha) = sha {
            s.push_str(&format!("  InstallerSha256: {sha}\n"));
        }
        s
    }

    fn fetcher(entries: &[(&str, &str)]) -> StaticFetcher {
        StaticFetcher {
            bodies: entries
                .iter()
                .map(|(u, b)| ((*u).to_string(), b.as_bytes().to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    fn id() -> PackageId {
        PackageId::parse("Foo.Bar").unwrap()
    }

    #[tokio::test]
    async fn downloads_latest_unpinned() {
        let f = fixture();
        add_version(&f, "1.2.3", &x64("https://e.com/Bar-1.2.3.exe", None));
        add_version(&f, "1.10.0", &x64("https://e.com/Bar-1.10.0.exe", None));
        let fetcher = fetcher(&[
            ("https://e.com/Bar-1.2.3.exe", "old"),
            ("https://e.com/Bar-1.10.0.exe", "new"),
        ]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(outcome.updated());
        assert_eq!(outcome.version(), Some("1.10.0"));
        let entry = state.version(&id(), "1.10.0").unwrap();
        assert!(!entry.pinned);
        assert_eq!(entry.git_rev.as_deref(), Some("rev1"));
        assert_eq!(entry.files["Bar-1.10.0.exe"], Sha256Hash::compute(b"new"));
        assert_eq!(
            std::fs::read(f.layout.download_dir(&id(), "1.10.0").join("Bar-1.10.0.exe")).unwrap(),
            b"new"
        );
    }

    #[tokio::test]
    async fn explicit_download_is_idempotent() {
        let f = fixture();
        add_version(&f, "1.2.3", &x64("https://e.com/Bar-1.2.3.exe", None));
        add_version(&f, "2.0.0", &x64("https://e.com/Bar-2.0.0.exe", None));
        let fetcher = fetcher(&[("https://e.com/Bar-1.2.3.exe", "payload")]);
        let mut state = StateStore::default();
        let downloader = Downloader::new(&f.source, &fetcher, &f.layout);

        let first = downloader.download(&mut state, &id(), Some("1.2.3")).await.unwrap();
        let hash_after_first = state.recorded_hash(&id(), "1.2.3", "Bar-1.2.3.exe").cloned();
        let second = downloader.download(&mut state, &id(), Some("1.2.3")).await.unwrap();

        assert!(first.updated());
        assert!(!second.updated());
        assert!(matches!(
            second,
            DownloadOutcome::AlreadyPresent { repaired: false, .. }
        ));
        assert_eq!(
            state.recorded_hash(&id(), "1.2.3", "Bar-1.2.3.exe").cloned(),
            hash_after_first
        );
        assert!(state.version(&id(), "1.2.3").unwrap().pinned);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unpinned_call_keeps_existing_pin() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", None));
        let fetcher = fetcher(&[("https://e.com/Bar.exe", "x")]);
        let mut state = StateStore::default();
        let downloader = Downloader::new(&f.source, &fetcher, &f.layout);

        downloader.download(&mut state, &id(), Some("1.0")).await.unwrap();
        // 1.0 is also the latest, so this resolves to the same entry
        let again = downloader.download(&mut state, &id(), None).await.unwrap();

        assert_eq!(again.version(), Some("1.0"));
        assert!(state.version(&id(), "1.0").unwrap().pinned);
    }

    #[tokio::test]
    async fn existing_file_is_recorded_without_fetch() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", None));
        let dir = f.layout.download_dir(&id(), "1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Bar.exe"), b"cached").unwrap();
        let fetcher = fetcher(&[]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(!outcome.updated());
        assert!(matches!(
            outcome,
            DownloadOutcome::AlreadyPresent {
                repaired: true,
                checksum_mismatch: false,
                ..
            }
        ));
        assert_eq!(
            state.recorded_hash(&id(), "1.0", "Bar.exe"),
            Some(&Sha256Hash::compute(b"cached"))
        );
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_file_is_checked_against_declared_checksum() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", Some(&"11".repeat(32))));
        let dir = f.layout.download_dir(&id(), "1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Bar.exe"), b"HALF").unwrap();
        let fetcher = fetcher(&[]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DownloadOutcome::AlreadyPresent {
                repaired: true,
                checksum_mismatch: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn checksum_mismatch_still_records_actual_hash() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", Some(&"AB".repeat(32))));
        let fetcher = fetcher(&[("https://e.com/Bar.exe", "tampered")]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        match outcome {
            DownloadOutcome::Downloaded {
                checksum_mismatch,
                sha256,
                ..
            } => {
                assert!(checksum_mismatch);
                assert_eq!(sha256, Sha256Hash::compute(b"tampered"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            state.recorded_hash(&id(), "1.0", "Bar.exe"),
            Some(&Sha256Hash::compute(b"tampered"))
        );
    }

    #[tokio::test]
    async fn matching_declared_checksum_is_case_insensitive() {
        let f = fixture();
        let declared = Sha256Hash::compute(b"good").as_str().to_uppercase();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", Some(&declared)));
        let fetcher = fetcher(&[("https://e.com/Bar.exe", "good")]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DownloadOutcome::Downloaded {
                checksum_mismatch: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn x64_url_without_filename_uses_x86() {
        let f = fixture();
        let installers = format!(
            "{}- Architecture: x86\n  InstallerUrl: https://e.com/Bar-x86.exe\n",
            x64("https://e.com/dir/", None)
        );
        add_version(&f, "1.0", &installers);
        let fetcher = fetcher(&[("https://e.com/Bar-x86.exe", "x86")]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DownloadOutcome::Downloaded { ref filename, .. } if filename == "Bar-x86.exe"
        ));
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["https://e.com/Bar-x86.exe".to_string()]);
    }

    #[tokio::test]
    async fn skips_are_not_errors() {
        let f = fixture();
        add_version(
            &f,
            "1.0",
            "- Architecture: arm64\n  InstallerUrl: https://e.com/arm.exe\n",
        );
        let fetcher = fetcher(&[]);
        let mut state = StateStore::default();
        let downloader = Downloader::new(&f.source, &fetcher, &f.layout);

        let outcome = downloader.download(&mut state, &id(), None).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Skipped(Skip::NoEligibleInstaller {
                version: "1.0".into()
            })
        );

        let outcome = downloader.download(&mut state, &id(), Some("9.9")).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Skipped(Skip::RequestedVersionNotFound {
                requested: "9.9".into()
            })
        );

        let missing = PackageId::parse("Foo.Missing").unwrap();
        let outcome = downloader.download(&mut state, &missing, None).await.unwrap();
        assert_eq!(outcome, DownloadOutcome::Skipped(Skip::PackageNotFound));

        assert!(state.downloads.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_records_nothing() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", None));
        let fetcher = fetcher(&[]);
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DownloadOutcome::Skipped(Skip::TransportFailure { .. })
        ));
        assert!(state.downloads.is_empty());
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_no_partial_file() {
        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", None));
        let mut fetcher = fetcher(&[("https://e.com/Bar.exe", "half")]);
        fetcher.fail_mid_stream = true;
        let mut state = StateStore::default();

        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DownloadOutcome::Skipped(Skip::TransportFailure { .. })
        ));
        assert!(!f.layout.download_dir(&id(), "1.0").join("Bar.exe").exists());
        assert!(state.downloads.is_empty());
    }

    /// Yields one chunk, then panics as if the process died mid-transfer.
    struct CrashingFetcher;

    #[async_trait]
    impl BlobFetcher for CrashingFetcher {
        async fn fetch(&self, _url: &str) -> Result<ByteStream, FetchError> {
            let chunks: [&'static [u8]; 2] = [b"HALF", b"REST"];
            Ok(futures::stream::iter(chunks)
                .map(|chunk| {
                    assert!(chunk != b"REST", "connection dropped");
                    Ok::<_, FetchError>(Bytes::from_static(chunk))
                })
                .boxed())
        }
    }

    #[tokio::test]
    async fn crash_mid_stream_leaves_nothing_to_repair() {
        use futures::FutureExt;
        use std::panic::AssertUnwindSafe;

        let f = fixture();
        add_version(&f, "1.0", &x64("https://e.com/Bar.exe", None));
        let mut state = StateStore::default();

        let crashed = AssertUnwindSafe(
            Downloader::new(&f.source, &CrashingFetcher, &f.layout).download(&mut state, &id(), None),
        )
        .catch_unwind()
        .await;
        assert!(crashed.is_err());

        let dir = f.layout.download_dir(&id(), "1.0");
        assert!(!dir.join("Bar.exe").exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        assert!(state.downloads.is_empty());

        let fetcher = fetcher(&[("https://e.com/Bar.exe", "HALFREST")]);
        let outcome = Downloader::new(&f.source, &fetcher, &f.layout)
            .download(&mut state, &id(), None)
            .await
            .unwrap();

        assert!(outcome.updated());
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
        assert_eq!(
            state.recorded_hash(&id(), "1.0", "Bar.exe"),
            Some(&Sha256Hash::compute(b"HALFREST"))
        );
    }
}
