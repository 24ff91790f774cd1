//! Manifest patching for republishing through a local mirror.
//!
//! Installer manifests are rewritten line by line: only the value of each
//! `InstallerUrl:` key changes, so comments, key order and scalar formatting
//! survive exactly as upstream wrote them. All other manifests are copied
//! byte for byte.

use crate::error::Result;
use crate::paths::{DOWNLOADS_DIR, Layout, patched_manifest_dir};
use crate::state::StateStore;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use wgm_schema::{ManifestDocument, PackageId, filename_from_url};

static INSTALLER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<lead>[ \t]*(?:-[ \t]+)?InstallerUrl:[ \t]*)(?P<value>[^\r\n]*?)(?P<eol>\r?)$")
        .unwrap_or_else(|e| unreachable!("invalid InstallerUrl pattern: {e}"))
});

/// Summary of a [`patch`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Versions whose manifests were written.
    pub patched: usize,
    /// Manifest files written.
    pub files: usize,
    /// `InstallerUrl` values rewritten.
    pub rewritten_urls: usize,
    /// Versions in state whose source manifests are gone.
    pub missing: Vec<(PackageId, String)>,
}

/// URL under which the mirror serves a downloaded file.
pub fn mirror_url(server_url: &str, id: &PackageId, version: &str, filename: &str) -> String {
    format!(
        "{}/{DOWNLOADS_DIR}/{}/{}/{version}/{filename}",
        server_url.trim_end_matches('/'),
        id.publisher(),
        id.package(),
    )
}

/// Rewrite every `InstallerUrl` value in `text` to point at the mirror.
/// Returns the new text and the number of values rewritten. Empty values
/// are left as they are.
pub fn rewrite_installer_urls(
    text: &str,
    server_url: &str,
    id: &PackageId,
    version: &str,
) -> (String, usize) {
    let mut count = 0;
    let out = INSTALLER_URL.replace_all(text, |caps: &Captures<'_>| {
        let value = Scalar::split(&caps["value"]);
        if value.text.is_empty() {
            return caps[0].to_string();
        }
        count += 1;
        let url = mirror_url(server_url, id, version, filename_from_url(value.text));
        debug!(package = %id, %version, from = value.text, to = %url, "rewriting installer url");
        format!(
            "{}{q}{url}{q}{}{}",
            &caps["lead"],
            value.rest,
            &caps["eol"],
            q = value.quote.map(String::from).unwrap_or_default(),
        )
    });
    (out.into_owned(), count)
}

/// A YAML scalar on a single line, with optional quoting and whatever
/// follows it (whitespace, comment).
struct Scalar<'a> {
    quote: Option<char>,
    text: &'a str,
    rest: &'a str,
}

impl<'a> Scalar<'a> {
    fn split(value: &'a str) -> Self {
        for quote in ['"', '\''] {
            if let Some(inner) = value.strip_prefix(quote) {
                if let Some(end) = inner.find(quote) {
                    return Self {
                        quote: Some(quote),
                        text: &inner[..end],
                        rest: &inner[end + 1..],
                    };
                }
            }
        }
        let end = value.find(" #").unwrap_or(value.len());
        let text = value[..end].trim_end();
        Self {
            quote: None,
            text,
            rest: &value[text.len()..],
        }
    }
}

/// Write patched copies of the manifests of every version in state under
/// `output_dir/manifests/...`.
///
/// # Errors
///
/// Local I/O failures. A version whose source manifests are missing is only
/// reported in [`PatchReport::missing`].
pub fn patch(
    state: &StateStore,
    layout: &Layout,
    server_url: &str,
    output_dir: &Path,
) -> Result<PatchReport> {
    let mut report = PatchReport::default();
    std::fs::create_dir_all(output_dir)?;

    for (id, package) in &state.downloads {
        for version in package.versions.keys() {
            let source = layout.manifest_dir(id, version);
            if !source.is_dir() {
                warn!(package = %id, %version, dir = %source.display(), "source manifests not found");
                report.missing.push((id.clone(), version.clone()));
                continue;
            }

            let target = patched_manifest_dir(output_dir, id, version);
            std::fs::create_dir_all(&target)?;

            for manifest in yaml_files(&source)? {
                let Some(name) = manifest.file_name() else {
                    continue;
                };
                let dest = target.join(name);
                let raw = std::fs::read(&manifest)?;
                match installer_text(&raw) {
                    Some(text) => {
                        let (patched, n) = rewrite_installer_urls(text, server_url, id, version);
                        std::fs::write(&dest, patched)?;
                        report.rewritten_urls += n;
                    }
                    None => std::fs::write(&dest, &raw)?,
                }
                report.files += 1;
            }

            info!(package = %id, %version, "patched manifests");
            report.patched += 1;
        }
    }
    Ok(report)
}

/// The text of `raw` if it is an installer manifest.
fn installer_text(raw: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(raw).ok()?;
    let doc = ManifestDocument::parse(text).ok()?;
    doc.is_installer().then_some(text)
}

/// `*.yaml` files directly inside `dir`, sorted by name.
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
