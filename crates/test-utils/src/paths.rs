//! Path utilities for test files.

use std::path::PathBuf;

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// A not-yet-existing file path inside `dir`.
///
/// # Example
///
/// ```
/// let dir = test_utils::temp_test_dir();
/// let path = test_utils::temp_file_path(&dir, "out.json");
/// assert!(!path.exists());
/// assert!(path.starts_with(dir.path()));
/// ```
pub fn temp_file_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
