//! File Materializer Unit Tests
//!
//! Tests for idempotent and atomic writes through the public API.

use secrets_sync::{FileMaterializer, RenderedFile};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn rendered(path: &Path, content: &str, mode: u32) -> RenderedFile {
    RenderedFile {
        path: path.to_path_buf(),
        mode,
        content: content.as_bytes().to_vec(),
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_repeated_writes_are_noops() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db-password");
    let materializer = FileMaterializer::new();
    let file = rendered(&path, "db-password-xyz", 0o600);

    assert!(materializer.write(&file).unwrap());
    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    for _ in 0..3 {
        assert!(!materializer.write(&file).unwrap());
    }
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    assert_eq!(entries(dir.path()), vec!["db-password"]);
}

#[test]
fn test_commit_replaces_atomically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tls.crt");
    let materializer = FileMaterializer::new();
    materializer.write(&rendered(&path, "old-cert", 0o644)).unwrap();

    let staged = materializer
        .stage(&rendered(&path, "new-cert", 0o644))
        .unwrap()
        .expect("content differs, so a file is staged");
    assert_eq!(fs::read_to_string(&path).unwrap(), "old-cert");

    staged.commit().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "new-cert");
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
    assert_eq!(entries(dir.path()), vec!["tls.crt"]);
}

#[test]
fn test_interrupted_write_leaves_prior_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tls.key");
    let materializer = FileMaterializer::new();
    materializer.write(&rendered(&path, "old-key", 0o600)).unwrap();

    let staged = materializer
        .stage(&rendered(&path, "new-key", 0o600))
        .unwrap()
        .expect("content differs, so a file is staged");
    drop(staged);

    assert_eq!(fs::read_to_string(&path).unwrap(), "old-key");
    assert_eq!(entries(dir.path()), vec!["tls.key"]);
}

#[test]
fn test_unchanged_content_stages_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("api-key");
    let materializer = FileMaterializer::new();
    materializer.write(&rendered(&path, "k", 0o600)).unwrap();

    assert!(materializer.stage(&rendered(&path, "k", 0o600)).unwrap().is_none());
}
