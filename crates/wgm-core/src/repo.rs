//! Local checkout of the upstream manifest repository.
//!
//! Only the `manifests/` tree is checked out (sparse checkout). All git work
//! is delegated to the `git` executable found on `PATH`.

use crate::error::{MirrorError, Result};
use crate::paths::MANIFESTS_DIR;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// What [`GitRepository::sync`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// A fresh clone was made.
    Cloned,
    /// An existing checkout was fetched and reset.
    Updated,
}

/// A sparse checkout directory.
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
}

impl GitRepository {
    /// Repository at `dir`, which need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Checkout directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/manifests`
    pub fn manifests_dir(&self) -> PathBuf {
        self.dir.join(MANIFESTS_DIR)
    }

    /// A checkout is present.
    pub fn exists(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Commit currently checked out, or `None` without a checkout.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Git`] if git is missing or fails.
    pub fn head_revision(&self) -> Result<Option<String>> {
        if !self.exists() {
            return Ok(None);
        }
        let out = self.git(["rev-parse", "HEAD"])?;
        Ok(Some(out.trim().to_string()))
    }

    /// Clone `url` or update the existing checkout, then check out `revision`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Git`] with git's stderr when any step fails.
    pub fn sync(&self, url: &str, revision: &str) -> Result<SyncKind> {
        let kind = if self.exists() {
            info!(dir = %self.dir.display(), "updating repository");
            self.enable_sparse_checkout()?;
            self.git(["fetch", "--prune", "origin"])?;
            SyncKind::Updated
        } else {
            info!(%url, dir = %self.dir.display(), "cloning repository");
            if let Some(parent) = self.dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            run_git(
                None,
                [
                    OsStr::new("clone"),
                    OsStr::new("--no-checkout"),
                    OsStr::new(url),
                    self.dir.as_os_str(),
                ],
            )?;
            self.enable_sparse_checkout()?;
            SyncKind::Cloned
        };

        self.git(["checkout", revision])?;
        let remote = format!("refs/remotes/origin/{revision}");
        if self.git(["rev-parse", "--verify", "--quiet", remote.as_str()]).is_ok() {
            self.git(["reset", "--hard", remote.as_str()])?;
        }
        self.git(["read-tree", "-mu", "HEAD"])?;

        info!(%revision, "repository synced");
        Ok(kind)
    }

    fn enable_sparse_checkout(&self) -> Result<()> {
        self.git(["config", "core.sparseCheckout", "true"])?;
        let file = self.dir.join(".git").join("info").join("sparse-checkout");
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, format!("{MANIFESTS_DIR}/\n"))?;
        Ok(())
    }

    fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_git(Some(&self.dir), args)
    }
}

fn run_git<I, S>(cwd: Option<&Path>, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let git = which::which("git").map_err(|_| MirrorError::Git("git not found in PATH".to_string()))?;
    let mut cmd = Command::new(git);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    debug!(command = ?cmd, "running git");

    let output = cmd.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MirrorError::Git(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
