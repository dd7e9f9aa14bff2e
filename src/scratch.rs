//! Per-request scratch files with guaranteed removal.
//!
//! Every request gets a UUID and two derived paths inside the scratch directory:
//! `{id}_original{ext}` for the upload and `{id}_converted.wav` for the canonical
//! waveform. [`ScratchRequest`] removes both when dropped, which covers early returns,
//! errors and unwinding panics alike.

use std::{
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while preparing scratch storage.
#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("Failed to prepare scratch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write scratch file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Scratch file {path} is missing or empty after write")]
    Unverified { path: PathBuf },
}

/// Dedicated directory for request scratch artifacts.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create (if needed) and canonicalize the scratch directory.
    pub fn open(path: &Path) -> Result<Self, ScratchError> {
        fs::create_dir_all(path).map_err(|source| ScratchError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
        let root = fs::canonicalize(path).map_err(|source| ScratchError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh request id and its two scratch paths. Nothing is created yet.
    pub fn allocate(&self, extension: &str) -> ScratchRequest {
        let id = Uuid::new_v4();
        let extension = extension.trim_start_matches('.');
        ScratchRequest {
            id,
            original: self.root.join(format!("{id}_original.{extension}")),
            converted: self.root.join(format!("{id}_converted.wav")),
        }
    }

    /// Resolve `path` and return it only if it lies inside the scratch directory.
    ///
    /// The parent must exist; it is canonicalized so symlinks and `..` cannot escape.
    pub fn resolve_inside(&self, path: &Path) -> Option<PathBuf> {
        resolve_inside(&self.root, path)
    }

    /// Remove every regular file left in the scratch directory. Returns the count removed.
    pub fn sweep(&self) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %self.root.display(), "scratch sweep skipped: {err}");
                return 0;
            }
        };
        let mut removed = 0usize;
        for entry in entries.filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_ok_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(path = %path.display(), "removed orphaned scratch file");
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "could not remove scratch file: {err}")
                }
            }
        }
        removed
    }
}

/// Scratch paths owned by one in-flight request.
#[derive(Debug)]
pub struct ScratchRequest {
    id: Uuid,
    original: PathBuf,
    converted: PathBuf,
}

impl ScratchRequest {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn converted_path(&self) -> &Path {
        &self.converted
    }

    /// Persist the uploaded bytes and confirm the file landed with content.
    pub fn write_original(&self, bytes: &[u8]) -> Result<(), ScratchError> {
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&self.original)?;
            file.write_all(bytes)?;
            file.sync_all()
        };
        write().map_err(|source| ScratchError::Write {
            path: self.original.clone(),
            source,
        })?;
        if !non_empty_file(&self.original) {
            return Err(ScratchError::Unverified {
                path: self.original.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for ScratchRequest {
    fn drop(&mut self) {
        for path in [&self.original, &self.converted] {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "cleaned up scratch file"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), "could not remove scratch file: {err}")
                }
            }
        }
    }
}

/// True when `path` is a regular file with at least one byte.
pub fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

pub(crate) fn resolve_inside(root: &Path, path: &Path) -> Option<PathBuf> {
    let file_name = match path.components().next_back()? {
        Component::Normal(name) => name.to_owned(),
        _ => return None,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = fs::canonicalize(parent).ok()?;
    let root = fs::canonicalize(root).ok()?;
    let resolved = parent.join(file_name);
    resolved.starts_with(&root).then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocated_paths_follow_naming_scheme() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        let request = scratch.allocate(".m4a");
        let id = request.id();
        assert_eq!(
            request.original_path(),
            scratch.root().join(format!("{id}_original.m4a"))
        );
        assert_eq!(
            request.converted_path(),
            scratch.root().join(format!("{id}_converted.wav"))
        );
        assert!(!request.original_path().exists());
    }

    #[test]
    fn ids_are_unique_per_allocation() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        let a = scratch.allocate(".wav");
        let b = scratch.allocate(".wav");
        assert_ne!(a.id(), b.id());
        assert_ne!(a.original_path(), b.original_path());
    }

    #[test]
    fn drop_removes_both_scratch_files() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        let request = scratch.allocate(".wav");
        request.write_original(b"RIFF").unwrap();
        fs::write(request.converted_path(), b"data").unwrap();
        let (original, converted) = (
            request.original_path().to_path_buf(),
            request.converted_path().to_path_buf(),
        );
        drop(request);
        assert!(!original.exists());
        assert!(!converted.exists());
    }

    #[test]
    fn drop_runs_during_unwind() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        let outcome = std::panic::catch_unwind(|| -> usize {
            let request = scratch.allocate(".ogg");
            request.write_original(b"OggS").unwrap();
            let path = request.original_path().to_path_buf();
            assert!(path.exists());
            panic!("stage failure for {}", path.display());
        });
        assert!(outcome.is_err());
        assert_eq!(fs::read_dir(scratch.root()).unwrap().count(), 0);
    }

    #[test]
    fn empty_write_fails_verification() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        let request = scratch.allocate(".wav");
        let err = request.write_original(&[]).unwrap_err();
        assert!(matches!(err, ScratchError::Unverified { .. }));
    }

    #[test]
    fn sweep_removes_files_but_not_directories() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(dir.path()).unwrap();
        fs::write(scratch.root().join("a_original.wav"), b"x").unwrap();
        fs::write(scratch.root().join("a_converted.wav"), b"y").unwrap();
        fs::create_dir(scratch.root().join("nested")).unwrap();
        assert_eq!(scratch.sweep(), 2);
        assert!(scratch.root().join("nested").is_dir());
    }

    #[test]
    fn resolve_inside_rejects_escapes() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::open(&dir.path().join("scratch")).unwrap();
        let inside = scratch.root().join("x_converted.wav");
        assert_eq!(scratch.resolve_inside(&inside), Some(inside));
        let escaped = scratch.root().join("..").join("outside.wav");
        assert_eq!(scratch.resolve_inside(&escaped), None);
        let dotted = scratch.root().join("..");
        assert_eq!(scratch.resolve_inside(&dotted), None);
        assert_eq!(scratch.resolve_inside(Path::new("/etc/passwd")), None);
    }
}
