//! End-to-end flow over a project directory: sync, validate, tamper, patch,
//! clean up.

use chrono::Utc;
use mockito::Server;
use std::path::Path;
use wgm_core::verify::FileStatus;
use wgm_core::{DownloadOutcome, HttpFetcher, Mirror, PackageFilter, init_project};
use wgm_schema::{PackageId, Sha256Hash};

fn write_manifests(root: &Path, version: &str, url: &str, sha: &str) {
    let dir = root.join(format!("mirror/manifests/f/Foo/Bar/{version}"));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("Foo.Bar.yaml"),
        format!("PackageIdentifier: Foo.Bar\nPackageVersion: {version}\nManifestType: version\n"),
    )
    .unwrap();
    std::fs::write(
        dir.join("Foo.Bar.installer.yaml"),
        format!(
            "PackageIdentifier: Foo.Bar\n\
             PackageVersion: {version}\n\
             Installers:\n\
             - Architecture: arm64\n  InstallerUrl: {url}/arm/Bar-{version}.exe\n\
             - Architecture: x64\n  InstallerUrl: {url}/foo/Bar-{version}.exe\n  InstallerSha256: {sha}\n\
             ManifestType: installer\n"
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn sync_validate_patch_cleanup() {
    let mut server = Server::new_async().await;
    let _v1 = server
        .mock("GET", "/foo/Bar-1.2.3.exe")
        .with_body("bar 1.2.3")
        .expect(1)
        .create_async()
        .await;
    let _v2 = server
        .mock("GET", "/foo/Bar-1.10.0.exe")
        .with_body("bar 1.10.0")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path()).unwrap();
    let good = Sha256Hash::compute(b"bar 1.2.3");
    write_manifests(dir.path(), "1.2.3", &server.url(), &good.as_str().to_uppercase());
    write_manifests(dir.path(), "1.10.0", &server.url(), "0000");

    let mut mirror = Mirror::open(dir.path()).unwrap();
    let source = mirror.manifest_source().unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let filter = PackageFilter::parse("Foo/Bar");
    let id = PackageId::parse("Foo.Bar").unwrap();

    // explicit version: pinned, checksum matches case-insensitively
    let summary = mirror
        .sync_matching(&source, &fetcher, &filter, Some("1.2.3"), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.updated(), 1);
    match &summary.packages[0].outcome {
        Ok(DownloadOutcome::Downloaded {
            filename,
            checksum_mismatch,
            sha256,
            ..
        }) => {
            assert_eq!(filename, "Bar-1.2.3.exe");
            assert!(!checksum_mismatch);
            assert_eq!(sha256, &good);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // second run is a no-op
    let summary = mirror
        .sync_matching(&source, &fetcher, &filter, Some("1.2.3"), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.updated(), 0);

    // latest resolves by version order, mismatch is recorded anyway
    let summary = mirror
        .sync_matching(&source, &fetcher, &filter, None, Utc::now())
        .await
        .unwrap();
    assert!(matches!(
        summary.packages[0].outcome,
        Ok(DownloadOutcome::Downloaded { ref version, checksum_mismatch: true, .. }) if version == "1.10.0"
    ));

    let report = mirror.validate().unwrap();
    assert!(report.all_valid);

    // tamper
    let file = dir.path().join("downloads/Foo/Bar/1.2.3/Bar-1.2.3.exe");
    std::fs::write(&file, "tampered").unwrap();
    let report = Mirror::open(dir.path()).unwrap().validate().unwrap();
    assert!(!report.all_valid);
    let check = &report.packages["Foo.Bar"].versions["1.2.3"].files["Bar-1.2.3.exe"];
    assert_eq!(check.status, FileStatus::Mismatch);
    assert_eq!(check.expected, good);

    // patch
    let (out, patched) = mirror.patch_repo(Some("https://mirror.local/"), None).unwrap();
    assert_eq!(patched.patched, 2);
    let text = std::fs::read_to_string(
        out.join("manifests/f/Foo/Bar/1.2.3/Foo.Bar.installer.yaml"),
    )
    .unwrap();
    assert!(text.contains("InstallerUrl: https://mirror.local/downloads/Foo/Bar/1.2.3/Bar-1.2.3.exe"));
    assert!(text.contains("InstallerUrl: https://mirror.local/downloads/Foo/Bar/1.2.3/Bar-1.2.3.exe\n  InstallerSha256:"));
    assert_eq!(
        std::fs::read(out.join("manifests/f/Foo/Bar/1.2.3/Foo.Bar.yaml")).unwrap(),
        std::fs::read(dir.path().join("mirror/manifests/f/Foo/Bar/1.2.3/Foo.Bar.yaml")).unwrap()
    );

    // retention keeps the pinned version no matter what
    let items = mirror.cleanup(Utc::now(), false).unwrap();
    assert!(items.is_empty());
    assert!(mirror.state().version(&id, "1.2.3").unwrap().pinned);
    assert!(!mirror.state().version(&id, "1.10.0").unwrap().pinned);

    // purge removes files, patched manifests and state
    let removed = mirror.purge(&filter, Some("1.10.0")).unwrap();
    assert_eq!(removed, vec![(id.clone(), "1.10.0".to_string())]);
    assert!(!dir.path().join("downloads/Foo/Bar/1.10.0").exists());
    assert!(!out.join("manifests/f/Foo/Bar/1.10.0").exists());
    assert!(out.join("manifests/f/Foo/Bar/1.2.3").exists());
}
