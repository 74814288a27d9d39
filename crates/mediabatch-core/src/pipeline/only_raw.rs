//! Raw files without a developed result.

use super::{CheckKind, Context};
use crate::batch::{FileId, Flags};
use crate::error::Result;
use crate::types::Stage;

/// Flag raw files with no result file of the same media type sharing their
/// root, counting unselected siblings as well.
pub(super) async fn run(ctx: &mut Context<'_>) -> Result<Flags> {
    let roots: Vec<(String, Vec<FileId>)> = ctx
        .batch
        .roots()
        .iter()
        .map(|(root, ids)| (root.clone(), ids.clone()))
        .collect();
    ctx.progress
        .set_step("Checking for single raw files ...", ctx.batch.len());

    let mut flags = Flags::new();
    for (root, ids) in roots {
        let unselected: Vec<FileId> = ctx
            .batch
            .flags(CheckKind::Unselected)
            .and_then(|flags| flags.get(&root))
            .cloned()
            .unwrap_or_default();

        for id in &ids {
            let file = ctx.batch.file(*id);
            ctx.progress
                .increase_step(Some(&file.path().to_string_lossy()));
            ctx.checkpoint().await?;

            let file = ctx.batch.file(*id);
            if file.profile().stage != Stage::Raw {
                continue;
            }
            let media_type = file.profile().media_type;
            let has_result = ids.iter().chain(unselected.iter()).any(|other| {
                let other = ctx.batch.file(*other).profile();
                other.stage == Stage::Result && other.media_type == media_type
            });
            if !has_result {
                flags.entry(root.clone()).or_default().push(*id);
            }
        }
    }
    Ok(flags)
}
