//! File system access used by discovery, checks and renames.

use chrono::{DateTime, Local, NaiveDateTime};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
    Missing,
}

/// File system operations the engine needs.
pub trait FileSystem: Send + Sync {
    /// Kind of the entry at `path`, following symlinks.
    fn entry_kind(&self, path: &Path) -> EntryKind;

    /// Direct children of a directory, sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool {
        self.entry_kind(path) != EntryKind::Missing
    }

    /// Last modification time in local time.
    fn modified(&self, path: &Path) -> Option<NaiveDateTime>;

    /// Move `from` to `to`. Fails if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Move to the trash. With `delete_fallback`, delete the file when the
    /// trash is not available.
    fn trash(&self, path: &Path, delete_fallback: bool) -> io::Result<()>;
}

/// The local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn entry_kind(&self, path: &Path) -> EntryKind {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => EntryKind::File,
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            Ok(_) => EntryKind::Other,
            Err(_) => EntryKind::Missing,
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map(|e| e.into_path()).map_err(io::Error::from))
            .collect()
    }

    fn modified(&self, path: &Path) -> Option<NaiveDateTime> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(DateTime::<Local>::from(modified).naive_local())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if std::fs::symlink_metadata(to).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        std::fs::rename(from, to)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn trash(&self, path: &Path, delete_fallback: bool) -> io::Result<()> {
        match trash::delete(path) {
            Ok(()) => Ok(()),
            Err(e) if delete_fallback && path.exists() => {
                tracing::warn!(
                    "Trash not available for {} ({}), deleting instead",
                    path.display(),
                    e
                );
                self.delete(path)
            }
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_entry_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();

        let local = LocalFileSystem;
        assert_eq!(local.entry_kind(&file), EntryKind::File);
        assert_eq!(local.entry_kind(dir.path()), EntryKind::Directory);
        assert_eq!(local.entry_kind(&dir.path().join("b.jpg")), EntryKind::Missing);
    }

    #[test]
    fn test_read_dir_sorted_single_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.jpg"), b"x").unwrap();

        let children = LocalFileSystem.read_dir(dir.path()).unwrap();
        let names: Vec<_> = children
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "sub"]);
    }

    #[test]
    fn test_read_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalFileSystem.read_dir(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_rename_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let err = LocalFileSystem.rename(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&b).unwrap(), b"b");

        let c = dir.path().join("c.jpg");
        LocalFileSystem.rename(&a, &c).unwrap();
        assert!(c.exists() && !a.exists());
    }

    #[test]
    fn test_modified_is_recent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();
        let modified = LocalFileSystem.modified(&file).unwrap();
        let now = Local::now().naive_local();
        assert!((now - modified).num_seconds().abs() < 60);
    }
}
