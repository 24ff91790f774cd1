//! An opened mirror project: configuration, layout and state together.
//!
//! Batch operations (sync, refresh, cleanup, purge) live here. They process
//! packages one after another and write `state.json` after every package
//! that changed, so an interrupted run keeps the work already done.

use crate::config::Config;
use crate::download::{DownloadOutcome, Downloader};
use crate::error::{MirrorError, Result};
use crate::fetch::BlobFetcher;
use crate::filter::PackageFilter;
use crate::paths::{CONFIG_FILE, Layout};
use crate::patch::{PatchReport, patch};
use crate::purge::{matching_downloads, purge_all, purge_package, purge_version};
use crate::repo::{GitRepository, SyncKind};
use crate::retention::plan_cleanup;
use crate::search::{SearchRow, search};
use crate::source::{FsManifestSource, ManifestSource};
use crate::state::StateStore;
use crate::verify::{ValidationReport, verify_all};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use wgm_schema::PackageId;
use wgm_schema::version::{is_newer, is_resolvable, resolve};

/// Result of one package within a batch.
#[derive(Debug)]
pub struct PackageResult {
    /// Package processed.
    pub id: PackageId,
    /// Download outcome, or the error that stopped this package.
    pub outcome: Result<DownloadOutcome>,
}

impl PackageResult {
    /// New content was downloaded.
    pub fn updated(&self) -> bool {
        self.outcome.as_ref().is_ok_and(DownloadOutcome::updated)
    }
}

/// Result of [`Mirror::sync_matching`].
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// One result per matched package, in discovery order.
    pub packages: Vec<PackageResult>,
}

impl SyncSummary {
    /// Packages that received new content.
    pub fn updated(&self) -> usize {
        self.packages.iter().filter(|p| p.updated()).count()
    }

    /// Packages that ended in an error.
    pub fn failed(&self) -> usize {
        self.packages.iter().filter(|p| p.outcome.is_err()).count()
    }
}

/// What refresh did with one package.
#[derive(Debug)]
pub enum RefreshAction {
    /// Only pinned versions are held; left alone.
    OnlyPinned,
    /// The newest unpinned version is already the latest.
    UpToDate {
        /// Newest unpinned version held.
        current: String,
    },
    /// A newer version was downloaded (or attempted).
    Refreshed {
        /// Newest unpinned version held before.
        from: String,
        /// Download outcome for the latest version.
        outcome: Result<DownloadOutcome>,
    },
}

/// Result of [`Mirror::refresh_unpinned`].
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// One action per package in state.
    pub packages: Vec<(PackageId, RefreshAction)>,
}

impl RefreshSummary {
    /// Packages that received new content.
    pub fn updated(&self) -> usize {
        self.packages
            .iter()
            .filter(|(_, action)| {
                matches!(action, RefreshAction::Refreshed { outcome: Ok(o), .. } if o.updated())
            })
            .count()
    }
}

/// A version selected by retention, and whether it was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupItem {
    /// Package.
    pub id: PackageId,
    /// Version selected for removal.
    pub version: String,
    /// Actually removed; always false on a dry run.
    pub removed: bool,
}

/// An opened project.
#[derive(Debug)]
pub struct Mirror {
    config: Config,
    layout: Layout,
    state: StateStore,
}

impl Mirror {
    /// Open the project at `root`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::NotInitialized`] when `config.json` or `state.json` is
    /// missing.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(&root.join(CONFIG_FILE))?;
        let layout = Layout::new(root, &config);
        let state = StateStore::load(&layout.state_file())?;
        Ok(Self {
            config,
            layout,
            state,
        })
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Loaded `config.json`.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved directory layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// In-memory state.
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Write the in-memory state to `state.json`.
    ///
    /// # Errors
    ///
    /// I/O or serialization errors.
    pub fn save_state(&self) -> Result<()> {
        self.state.save(&self.layout.state_file())
    }

    /// The configured checkout.
    pub fn repository(&self) -> GitRepository {
        GitRepository::new(self.layout.mirror_dir())
    }

    /// Clone or update the repository checkout per configuration.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Git`] when git is missing or fails.
    pub fn sync_repo(&self) -> Result<SyncKind> {
        self.repository()
            .sync(&self.config.repo_url, &self.config.revision)
    }

    /// Manifest source over the local checkout.
    ///
    /// # Errors
    ///
    /// [`MirrorError::RepositoryMissing`] without a checkout.
    pub fn manifest_source(&self) -> Result<FsManifestSource> {
        let manifests = self.layout.manifests_dir();
        if !manifests.is_dir() {
            return Err(MirrorError::RepositoryMissing(self.layout.mirror_dir().to_path_buf()));
        }
        let revision = match self.repository().head_revision() {
            Ok(rev) => rev,
            Err(e) => {
                warn!(error = %e, "could not read repository revision");
                None
            }
        };
        Ok(FsManifestSource::new(manifests).with_revision(revision))
    }

    /// Download the latest (or `version`) of every package matching `filter`.
    ///
    /// # Errors
    ///
    /// Only discovery and state writes abort the batch; per-package errors
    /// are carried in the summary.
    pub async fn sync_matching<F: BlobFetcher>(
        &mut self,
        source: &FsManifestSource,
        fetcher: &F,
        filter: &PackageFilter,
        version: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SyncSummary> {
        let ids = source.discover(filter, false)?;
        info!(filter = %filter.publisher(), packages = ids.len(), "syncing");

        let mut summary = SyncSummary::default();
        let downloader = Downloader::new(source, fetcher, &self.layout);
        for id in ids {
            let outcome = downloader.download(&mut self.state, &id, version).await;
            self.checkpoint(&id, &outcome)?;
            summary.packages.push(PackageResult { id, outcome });
        }

        self.state.mark_synced(now);
        self.save_state()?;
        Ok(summary)
    }

    /// Bring every package with unpinned versions up to the latest version
    /// in the repository. Pinned versions are never touched.
    ///
    /// # Errors
    ///
    /// Only state writes abort the batch; per-package errors are carried in
    /// the summary.
    pub async fn refresh_unpinned<S: ManifestSource, F: BlobFetcher>(
        &mut self,
        source: &S,
        fetcher: &F,
        now: DateTime<Utc>,
    ) -> Result<RefreshSummary> {
        let ids: Vec<PackageId> = self.state.downloads.keys().cloned().collect();
        let mut summary = RefreshSummary::default();
        let downloader = Downloader::new(source, fetcher, &self.layout);

        for id in ids {
            let Some(current) = self.newest_unpinned(&id) else {
                info!(package = %id, "only pinned versions; skipping refresh");
                summary.packages.push((id, RefreshAction::OnlyPinned));
                continue;
            };

            let latest = match source.versions(&id) {
                Ok(versions) => versions.and_then(|v| {
                    resolve(v.iter().map(String::as_str).filter(|s| is_resolvable(s))).map(str::to_string)
                }),
                Err(e) => {
                    warn!(package = %id, error = %e, "could not list versions");
                    None
                }
            };

            match latest {
                Some(latest) if is_newer(&current, &latest) => {
                    info!(package = %id, from = %current, to = %latest, "refreshing");
                    let outcome = downloader.download(&mut self.state, &id, None).await;
                    self.checkpoint(&id, &outcome)?;
                    summary.packages.push((id, RefreshAction::Refreshed { from: current, outcome }));
                }
                _ => summary.packages.push((id, RefreshAction::UpToDate { current })),
            }
        }

        self.state.mark_synced(now);
        self.save_state()?;
        Ok(summary)
    }

    fn newest_unpinned(&self, id: &PackageId) -> Option<String> {
        let package = self.state.package(id)?;
        resolve(
            package
                .versions
                .iter()
                .filter(|(_, entry)| !entry.pinned)
                .map(|(v, _)| v.as_str()),
        )
        .map(str::to_string)
    }

    fn checkpoint(&self, id: &PackageId, outcome: &Result<DownloadOutcome>) -> Result<()> {
        match outcome {
            Ok(DownloadOutcome::Skipped(_)) => Ok(()),
            Ok(_) => self.save_state(),
            Err(e) => {
                warn!(package = %id, error = %e, "package failed");
                Ok(())
            }
        }
    }

    /// Apply (or with `dry_run`, only plan) the configured retention policy.
    ///
    /// # Errors
    ///
    /// Fails if a selected version cannot be removed or state cannot be saved.
    pub fn cleanup(&mut self, now: DateTime<Utc>, dry_run: bool) -> Result<Vec<CleanupItem>> {
        let policy = self.config.cleanup.clone();
        let plan: Vec<(PackageId, String)> = self
            .state
            .downloads
            .iter()
            .flat_map(|(id, package)| {
                plan_cleanup(
                    package,
                    now,
                    policy.max_unpinned_versions,
                    policy.max_unpinned_age_months,
                )
                .into_iter()
                .map(move |v| (id.clone(), v))
            })
            .collect();

        let mut items = Vec::with_capacity(plan.len());
        for (id, version) in plan {
            let removed = !dry_run
                && purge_version(
                    &mut self.state,
                    &self.layout,
                    self.layout.patch_dir(),
                    &id,
                    &version,
                )?;
            items.push(CleanupItem { id, version, removed });
        }

        if items.iter().any(|i| i.removed) {
            self.save_state()?;
        }
        Ok(items)
    }

    /// Packages in state selected by `filter`.
    pub fn matching_downloads(&self, filter: &PackageFilter) -> Vec<PackageId> {
        matching_downloads(&self.state, filter)
    }

    /// Purge packages matching `filter`, or only `version` of them.
    /// Returns the removed `(package, version)` pairs.
    ///
    /// # Errors
    ///
    /// Fails if a directory cannot be removed or state cannot be saved.
    pub fn purge(&mut self, filter: &PackageFilter, version: Option<&str>) -> Result<Vec<(PackageId, String)>> {
        let patch_root = self.layout.patch_dir().to_path_buf();
        let mut removed = Vec::new();
        for id in matching_downloads(&self.state, filter) {
            match version {
                Some(v) => {
                    if purge_version(&mut self.state, &self.layout, &patch_root, &id, v)? {
                        removed.push((id, v.to_string()));
                    }
                }
                None => {
                    for v in purge_package(&mut self.state, &self.layout, &patch_root, &id)? {
                        removed.push((id.clone(), v));
                    }
                }
            }
        }
        if !removed.is_empty() {
            self.save_state()?;
        }
        Ok(removed)
    }

    /// Purge everything. Returns the number of versions removed.
    ///
    /// # Errors
    ///
    /// Fails if a directory cannot be removed or state cannot be saved.
    pub fn purge_all(&mut self) -> Result<usize> {
        let patch_root = self.layout.patch_dir().to_path_buf();
        let count = purge_all(&mut self.state, &self.layout, &patch_root)?;
        self.save_state()?;
        Ok(count)
    }

    /// Verify every recorded file.
    ///
    /// # Errors
    ///
    /// Fails if a present file cannot be read.
    pub fn validate(&self) -> Result<ValidationReport> {
        verify_all(&self.state, &self.layout)
    }

    /// Search the checkout, annotated with local status.
    ///
    /// # Errors
    ///
    /// [`MirrorError::RepositoryMissing`] without a checkout.
    pub fn search(&self, filter: &PackageFilter) -> Result<Vec<SearchRow>> {
        let source = self.manifest_source()?;
        search(&source, &self.state, &self.layout, filter)
    }

    /// Write patched manifests. Configured server URL and patch directory are
    /// used unless overridden.
    ///
    /// # Errors
    ///
    /// [`MirrorError::RepositoryMissing`] without a checkout, or local I/O
    /// failures.
    pub fn patch_repo(&self, server_url: Option<&str>, patch_dir: Option<&Path>) -> Result<(PathBuf, PatchReport)> {
        self.manifest_source()?;
        let server_url = server_url.unwrap_or(&self.config.server_url);
        let output = self.layout.resolve_patch_dir(patch_dir);
        let report = patch(&self.state, &self.layout, server_url, &output)?;
        Ok((output, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::init_project;
    use crate::fetch::HttpFetcher;
    use crate::state::{PackageState, RecordContext, VersionEntry};
    use chrono::TimeZone;
    use mockito::Server;
    use wgm_schema::Sha256Hash;

    fn project() -> (tempfile::TempDir, Mirror) {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path()).unwrap();
        let mirror = Mirror::open(dir.path()).unwrap();
        (dir, mirror)
    }

    fn add_manifest(mirror: &Mirror, id: &str, version: &str, url: &str) {
        let id = PackageId::parse(id).unwrap();
        let dir = mirror.layout().manifest_dir(&id, version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{id}.installer.yaml")),
            format!("PackageIdentifier: {id}\nInstallers:\n- Architecture: x64\n  InstallerUrl: {url}\nManifestType: installer\n"),
        )
        .unwrap();
    }

    #[test]
    fn open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Mirror::open(dir.path()).unwrap_err();
        assert!(matches!(err, MirrorError::NotInitialized { .. }));
    }

    #[test]
    fn missing_repository_is_reported() {
        let (_dir, mirror) = project();
        assert!(matches!(
            mirror.manifest_source(),
            Err(MirrorError::RepositoryMissing(_))
        ));
        assert!(matches!(
            mirror.patch_repo(None, None),
            Err(MirrorError::RepositoryMissing(_))
        ));
    }

    #[tokio::test]
    async fn sync_then_refresh() {
        let mut server = Server::new_async().await;
        let _a = server
            .mock("GET", "/bar-1.0.exe")
            .with_body("one")
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/bar-2.0.exe")
            .with_body("two")
            .create_async()
            .await;
        let _c = server
            .mock("GET", "/baz.exe")
            .with_status(500)
            .create_async()
            .await;

        let (dir, mut mirror) = project();
        add_manifest(&mirror, "Foo.Bar", "1.0", &format!("{}/bar-1.0.exe", server.url()));
        add_manifest(&mirror, "Foo.Baz", "1.0", &format!("{}/baz.exe", server.url()));

        let fetcher = HttpFetcher::new().unwrap();
        let source = mirror.manifest_source().unwrap();
        let now = Utc::now();
        let summary = mirror
            .sync_matching(&source, &fetcher, &PackageFilter::parse("foo"), None, now)
            .await
            .unwrap();
        assert_eq!(summary.packages.len(), 2);
        assert_eq!(summary.updated(), 1);
        assert!(matches!(
            summary.packages[1].outcome,
            Ok(DownloadOutcome::Skipped(crate::download::Skip::TransportFailure { .. }))
        ));

        let reloaded = Mirror::open(dir.path()).unwrap();
        let bar = PackageId::parse("Foo.Bar").unwrap();
        assert!(reloaded.state().version(&bar, "1.0").is_some());
        assert!(reloaded.state().package(&PackageId::parse("Foo.Baz").unwrap()).is_none());
        assert_eq!(reloaded.state().last_sync, Some(now));

        add_manifest(&mirror, "Foo.Bar", "2.0", &format!("{}/bar-2.0.exe", server.url()));
        let summary = mirror.refresh_unpinned(&source, &fetcher, Utc::now()).await.unwrap();
        assert_eq!(summary.updated(), 1);
        let entry = mirror.state().version(&bar, "2.0").unwrap();
        assert!(!entry.pinned);

        let summary = mirror.refresh_unpinned(&source, &fetcher, Utc::now()).await.unwrap();
        assert_eq!(summary.updated(), 0);
        assert!(matches!(summary.packages[0].1, RefreshAction::UpToDate { ref current } if current == "2.0"));
    }

    #[tokio::test]
    async fn refresh_skips_pinned_only_packages() {
        let (_dir, mut mirror) = project();
        add_manifest(&mirror, "Foo.Bar", "1.0", "http://127.0.0.1:9/never.exe");
        add_manifest(&mirror, "Foo.Bar", "2.0", "http://127.0.0.1:9/never.exe");
        let bar = PackageId::parse("Foo.Bar").unwrap();
        mirror.state.record_file(
            &bar,
            "1.0",
            "never.exe",
            Sha256Hash::compute(b""),
            RecordContext {
                pinned: true,
                git_rev: None,
                now: Utc::now(),
            },
        );

        let source = mirror.manifest_source().unwrap();
        let fetcher = HttpFetcher::new().unwrap();
        let summary = mirror.refresh_unpinned(&source, &fetcher, Utc::now()).await.unwrap();
        assert!(matches!(summary.packages[0].1, RefreshAction::OnlyPinned));
        assert!(mirror.state().version(&bar, "2.0").is_none());
    }

    #[test]
    fn cleanup_dry_run_and_apply() {
        let (dir, mut mirror) = project();
        let bar = PackageId::parse("Foo.Bar").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut package = PackageState::default();
        for (v, pinned) in [("1.0", true), ("1.1", false), ("1.2", false), ("1.3", false)] {
            package.versions.insert(
                v.to_string(),
                VersionEntry {
                    git_rev: None,
                    files: Default::default(),
                    timestamp: now,
                    pinned,
                },
            );
            let dl = mirror.layout().download_dir(&bar, v);
            std::fs::create_dir_all(&dl).unwrap();
        }
        mirror.state.downloads.insert(bar.clone(), package);
        mirror.config.cleanup.max_unpinned_versions = 1;

        let planned = mirror.cleanup(now, true).unwrap();
        let versions: Vec<&str> = planned.iter().map(|i| i.version.as_str()).collect();
        assert_eq!(versions, vec!["1.1", "1.2"]);
        assert!(planned.iter().all(|i| !i.removed));
        assert_eq!(mirror.state().package(&bar).unwrap().versions.len(), 4);

        let applied = mirror.cleanup(now, false).unwrap();
        assert!(applied.iter().all(|i| i.removed));
        assert!(!mirror.layout().download_dir(&bar, "1.1").exists());
        assert!(mirror.layout().download_dir(&bar, "1.0").exists());

        let reloaded = Mirror::open(dir.path()).unwrap();
        let left: Vec<&String> = reloaded.state().package(&bar).unwrap().versions.keys().collect();
        assert_eq!(left, vec!["1.0", "1.3"]);
    }

    #[test]
    fn purge_by_filter() {
        let (_dir, mut mirror) = project();
        let ctx = RecordContext {
            pinned: false,
            git_rev: None,
            now: Utc::now(),
        };
        for (id, v) in [("Foo.Bar", "1.0"), ("Foo.Bar", "2.0"), ("Foo.Baz", "1.0")] {
            let id = PackageId::parse(id).unwrap();
            mirror
                .state
                .record_file(&id, v, "x.exe", Sha256Hash::compute(b"x"), ctx.clone());
        }

        let removed = mirror
            .purge(&PackageFilter::parse("Foo/Bar"), Some("1.0"))
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(mirror.state().downloads.len(), 2);

        let removed = mirror.purge(&PackageFilter::parse("Foo"), None).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(mirror.state().downloads.is_empty());
        assert_eq!(mirror.purge_all().unwrap(), 0);
    }
}
