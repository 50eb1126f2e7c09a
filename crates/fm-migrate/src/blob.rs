//! Blob store seam for legacy exports.

use crate::error::{MigrateError, MigrateResult};
use std::path::{Component, Path, PathBuf};

/// Where legacy exports are fetched from, by object name.
pub trait BlobStore: Send + Sync {
    /// Resolve `name` to a readable local file.
    fn fetch(&self, name: &str) -> MigrateResult<PathBuf>;
}

/// Exports stored as plain files under one directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for LocalBlobStore {
    fn fetch(&self, name: &str) -> MigrateResult<PathBuf> {
        let relative = Path::new(name);
        let stays_inside = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !stays_inside {
            return Err(MigrateError::InvalidObjectName {
                name: name.to_string(),
            });
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(MigrateError::MissingFile {
                name: name.to_string(),
                path: path.display().to_string(),
            });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2014")).unwrap();
        std::fs::write(dir.path().join("2014/users.tsv"), "1\ta@x.com\n").unwrap();

        let store = LocalBlobStore::new(dir.path());
        let path = store.fetch("2014/users.tsv").unwrap();
        assert!(path.ends_with("2014/users.tsv"));
    }

    #[test]
    fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let err = store.fetch("nope.csv").unwrap_err();
        assert!(matches!(err, MigrateError::MissingFile { .. }));
    }

    #[test]
    fn test_fetch_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for name in ["../secrets.csv", "/etc/passwd", ""] {
            let err = store.fetch(name).unwrap_err();
            assert!(
                matches!(err, MigrateError::InvalidObjectName { .. }),
                "{name}"
            );
        }
    }
}
