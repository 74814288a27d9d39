//! Siblings of batch files the user did not select.

use std::collections::BTreeSet;

use super::Context;
use crate::batch::{FileEntry, Flags};
use crate::capability::EntryKind;
use crate::error::Result;

/// Flag every supported file next to a batch file whose root is in the
/// batch but which is not a batch file itself.
pub(super) async fn run(ctx: &mut Context<'_>) -> Result<Flags> {
    let directories: Vec<_> = ctx
        .batch
        .roots()
        .values()
        .filter_map(|ids| ids.first())
        .map(|id| ctx.batch.file(*id).directory().to_path_buf())
        .collect();
    ctx.progress
        .set_step("Checking for unselected files ...", directories.len());

    let mut seen = BTreeSet::new();
    let mut flags = Flags::new();
    for directory in directories {
        ctx.progress
            .increase_step(Some(&directory.to_string_lossy()));
        ctx.checkpoint().await?;
        if !seen.insert(directory.clone()) {
            continue;
        }

        let children = match ctx.caps.fs.read_dir(&directory) {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", directory.display(), e);
                continue;
            }
        };
        for child in children {
            ctx.checkpoint().await?;
            let Some(profile) = ctx.config.extensions.lookup_path(&child).cloned() else {
                continue;
            };
            if ctx.caps.fs.entry_kind(&child) != EntryKind::File {
                continue;
            }
            let keys = ctx.batch.grouping().keys(&child.to_string_lossy());
            let Some(siblings) = ctx.batch.roots().get(&keys.root) else {
                continue;
            };
            if siblings.iter().any(|id| ctx.batch.file(*id).path() == child) {
                continue;
            }

            let root = keys.root.clone();
            let mut entry = FileEntry::new(child, keys, profile, false);
            entry.init(ctx.caps.fs.as_ref(), ctx.caps.metadata.as_ref());
            tracing::debug!("Unselected file {}", entry.path().display());
            let id = ctx.batch.create(entry);
            flags.entry(root).or_default().push(id);
        }
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FileId;
    use crate::config::{BatchOptions, Mode};
    use crate::testing::TestBed;

    #[tokio::test]
    async fn test_flags_siblings_sharing_a_root() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Group));
        bed.add("a.cr2");
        for name in ["a.jpg", "a.txt", "b.jpg"] {
            std::fs::write(bed.path(name), name).unwrap();
        }

        let flags = run(&mut bed.context()).await.unwrap();
        let flagged: Vec<FileId> = flags.values().flatten().copied().collect();
        assert_eq!(flagged.len(), 1);

        let sibling = bed.batch.file(flagged[0]);
        assert_eq!(sibling.path(), bed.path("a.jpg"));
        assert!(!bed.batch.contains(flagged[0]));
        assert_eq!(bed.batch.len(), 1);
    }

    #[tokio::test]
    async fn test_selected_siblings_are_not_flagged() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Group));
        bed.add("a.cr2");
        bed.add("a.jpg");

        let flags = run(&mut bed.context()).await.unwrap();
        assert!(flags.is_empty());
    }
}
