//! Groups of panorama/HDR parts that have no assembled result yet.

use std::path::PathBuf;

use super::Context;
use crate::batch::{FileEntry, FileId, Flags};
use crate::error::Result;

/// In post-processing mode, synthesize a result file for every group whose
/// members are all parts (no member's index is the bare extension) and at
/// least one part can be group-converted.
pub(super) async fn run(ctx: &mut Context<'_>) -> Result<Flags> {
    let mut flags = Flags::new();
    if !ctx.postprocessing() {
        return Ok(flags);
    }

    let groups: Vec<(String, Vec<FileId>)> = ctx
        .batch
        .groups()
        .map(|(_, group)| (group.key().to_string(), group.members().to_vec()))
        .collect();
    ctx.progress
        .set_step("Checking for new file groups ...", ctx.batch.len());

    for (key, members) in groups {
        let mut has_result = false;
        let mut parts = Vec::new();
        for id in &members {
            ctx.progress
                .increase_step(Some(&ctx.batch.file(*id).path().to_string_lossy()));
            ctx.checkpoint().await?;

            let file = ctx.batch.file(*id);
            if file.index() == file.extension() {
                has_result = true;
            } else if file.profile().group_convert {
                parts.push(*id);
            }
        }

        if has_result || parts.is_empty() || key.is_empty() || key.ends_with('/') {
            continue;
        }

        let extension = ctx.batch.file(parts[0]).extension().to_string();
        let location = format!("{key}{extension}");
        let Some(profile) = ctx.config.extensions.lookup(&extension).cloned() else {
            continue;
        };
        let keys = ctx.batch.grouping().keys(&location);
        let root = keys.root.clone();
        let mut entry = FileEntry::new(PathBuf::from(location), keys, profile, true);
        entry.members = parts;
        tracing::debug!("New file group {}", entry.path().display());

        let id = ctx.batch.create(entry);
        flags.entry(root).or_default().push(id);
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::config::{BatchOptions, Mode};
    use crate::pipeline::CheckKind;
    use crate::testing::TestBed;

    fn flagged(flags: &Flags) -> Vec<FileId> {
        flags.values().flatten().copied().collect()
    }

    #[tokio::test]
    async fn test_parts_without_result_get_a_virtual_group() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Postprocess));
        let a = bed.add("pano(a).jpg");
        let b = bed.add("pano(b).jpg");

        let flags = run(&mut bed.context()).await.unwrap();
        let ids = flagged(&flags);
        assert_eq!(ids.len(), 1);

        let result = bed.batch.file(ids[0]);
        assert_eq!(result.path(), bed.path("pano.jpg"));
        assert_eq!(result.members(), &[a, b]);
        assert_eq!(result.decision(CheckKind::NewFileGroup), Some(Action::ConvertGroup));
        assert!(!bed.batch.contains(ids[0]));
    }

    #[tokio::test]
    async fn test_group_with_result_is_left_alone() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Postprocess));
        bed.add("sun(a).jpg");
        bed.add("sun(b).jpg");
        bed.add("sun.jpg");

        let flags = run(&mut bed.context()).await.unwrap();
        assert!(flags.is_empty());
    }

    #[tokio::test]
    async fn test_parts_that_cannot_be_converted_are_skipped() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Postprocess));
        bed.add("scan(a).tif");
        bed.add("scan(b).tif");

        let flags = run(&mut bed.context()).await.unwrap();
        assert!(flags.is_empty());
    }

    #[tokio::test]
    async fn test_only_runs_when_postprocessing() {
        let mut bed = TestBed::new(BatchOptions::preset(Mode::Group));
        bed.add("pano(a).jpg");
        bed.add("pano(b).jpg");

        let flags = run(&mut bed.context()).await.unwrap();
        assert!(flags.is_empty());
    }
}
