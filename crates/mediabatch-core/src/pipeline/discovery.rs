//! File discovery for the batch inputs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::Context;
use crate::batch::FileEntry;
use crate::capability::{EntryKind, FileSystem};
use crate::error::Result;

/// Turn a user input (path or `file://` URI) into an absolute path.
///
/// Other URI schemes are not supported and yield `None`.
pub fn normalize_input(input: &str) -> Option<PathBuf> {
    let path = match input.split_once("://") {
        Some(("file", rest)) => {
            // Drop an authority such as `localhost`
            let rest = match rest.find('/') {
                Some(0) => rest,
                Some(i) => &rest[i..],
                None => return None,
            };
            PathBuf::from(percent_decode(rest))
        }
        Some((scheme, _)) if is_scheme(scheme) => {
            tracing::warn!("Ignoring unsupported location {}", input);
            return None;
        }
        _ => PathBuf::from(shellexpand::tilde(input).into_owned()),
    };
    std::path::absolute(&path).ok()
}

fn is_scheme(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(high), Some(low)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((high * 16 + low) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Deepest directory containing every input.
pub fn common_root(fs: &dyn FileSystem, inputs: &[PathBuf]) -> Option<PathBuf> {
    let mut common: Option<PathBuf> = None;
    for input in inputs {
        let directory = if fs.entry_kind(input) == EntryKind::Directory {
            input.clone()
        } else {
            input.parent()?.to_path_buf()
        };
        common = Some(match common {
            None => directory,
            Some(current) => current
                .components()
                .zip(directory.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common
}

/// Path relative to `root` for display, or the path itself.
pub fn relative_to<'a>(path: &'a Path, root: Option<&Path>) -> &'a Path {
    root.and_then(|root| path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path)
}

/// Add every supported file under the inputs to the batch.
///
/// Directory inputs are listed one level deep, or fully when recursion is
/// enabled. Unreadable directories are skipped with a warning.
pub(crate) async fn discover(ctx: &mut Context<'_>, inputs: &[PathBuf]) -> Result<()> {
    ctx.progress
        .set_step("Searching selected directories ...", inputs.len());
    let postprocessing = ctx.postprocessing();
    let recursive = ctx.options.recursive;
    let mut seen = HashSet::new();

    for input in inputs {
        ctx.progress.increase_step(Some(&input.to_string_lossy()));
        let mut pending = vec![(input.clone(), 0usize)];

        while let Some((path, depth)) = pending.pop() {
            ctx.checkpoint().await?;
            match ctx.caps.fs.entry_kind(&path) {
                EntryKind::Directory => {
                    if depth > 0 && !recursive {
                        continue;
                    }
                    match ctx.caps.fs.read_dir(&path) {
                        Ok(children) => {
                            pending.extend(children.into_iter().rev().map(|c| (c, depth + 1)))
                        }
                        Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
                    }
                }
                EntryKind::File => {
                    let Some(profile) = ctx.config.extensions.lookup_path(&path).cloned() else {
                        continue;
                    };
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    let keys = ctx.batch.grouping().keys(&path.to_string_lossy());
                    let id = ctx
                        .batch
                        .create(FileEntry::new(path, keys, profile, postprocessing));
                    ctx.batch.add_file(id);
                }
                EntryKind::Missing => tracing::warn!("{} does not exist", path.display()),
                EntryKind::Other => {}
            }
        }
    }
    tracing::debug!("Discovered {} file(s)", ctx.batch.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::LocalFileSystem;
    use crate::config::{BatchOptions, Mode};
    use crate::testing::TestBed;

    #[test]
    fn test_normalize_plain_path() {
        assert_eq!(
            normalize_input("/photos/a.jpg"),
            Some(PathBuf::from("/photos/a.jpg"))
        );
        let relative = normalize_input("a.jpg").unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("a.jpg"));
    }

    #[test]
    fn test_normalize_file_uri() {
        assert_eq!(
            normalize_input("file:///photos/My%20Trip/a.jpg"),
            Some(PathBuf::from("/photos/My Trip/a.jpg"))
        );
        assert_eq!(
            normalize_input("file://localhost/photos/a.jpg"),
            Some(PathBuf::from("/photos/a.jpg"))
        );
    }

    #[test]
    fn test_normalize_rejects_other_schemes() {
        assert_eq!(normalize_input("smb://server/share/a.jpg"), None);
        assert_eq!(normalize_input("https://example.com/a.jpg"), None);
    }

    #[test]
    fn test_percent_decode_keeps_invalid_sequences() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%41b"), "Ab");
    }

    #[test]
    fn test_common_root() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("2019").join("may");
        let b = dir.path().join("2019").join("june");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("x.jpg"), b"x").unwrap();

        let root = common_root(&LocalFileSystem, &[a.clone(), b.join("x.jpg")]).unwrap();
        assert_eq!(root, dir.path().join("2019"));
        assert_eq!(common_root(&LocalFileSystem, &[a.clone()]).unwrap(), a);
        assert!(common_root(&LocalFileSystem, &[]).is_none());
    }

    #[test]
    fn test_relative_to() {
        let root = PathBuf::from("/photos");
        assert_eq!(
            relative_to(Path::new("/photos/may/a.jpg"), Some(&root)),
            Path::new("may/a.jpg")
        );
        assert_eq!(
            relative_to(Path::new("/other/a.jpg"), Some(&root)),
            Path::new("/other/a.jpg")
        );
        assert_eq!(relative_to(Path::new("/photos"), Some(&root)), Path::new("/photos"));
    }

    fn photo_tree(bed: &TestBed) {
        let sub = bed.path("2019").join("may");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(bed.path("a.jpg"), b"a").unwrap();
        std::fs::write(bed.path("notes.txt"), b"n").unwrap();
        std::fs::write(sub.join("b.jpg"), b"b").unwrap();
    }

    fn discovered(bed: &TestBed) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = bed.batch.files().map(|(_, f)| f.path().to_path_buf()).collect();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_discover_lists_one_level_by_default() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Group));
        photo_tree(&bed);
        let inputs = vec![bed.dir.path().to_path_buf()];

        discover(&mut bed.context(), &inputs).await.unwrap();
        assert_eq!(discovered(&bed), vec![bed.path("a.jpg")]);
    }

    #[tokio::test]
    async fn test_discover_walks_subdirectories_when_recursive() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Postprocess));
        photo_tree(&bed);
        let inputs = vec![bed.dir.path().to_path_buf(), bed.path("a.jpg")];

        discover(&mut bed.context(), &inputs).await.unwrap();
        assert_eq!(
            discovered(&bed),
            vec![bed.path("2019").join("may").join("b.jpg"), bed.path("a.jpg")]
        );
        assert_eq!(bed.batch.len(), 2);
    }
}
