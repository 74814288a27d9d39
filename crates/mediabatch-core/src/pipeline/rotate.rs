//! Images that need lossless rotation.

use super::Context;
use crate::batch::{FileId, Flags};
use crate::error::Result;

pub(super) async fn run(ctx: &mut Context<'_>) -> Result<Flags> {
    let ids: Vec<FileId> = ctx.batch.roots().values().flatten().copied().collect();
    ctx.progress
        .set_step("Checking for rotated files ...", ids.len());

    let mut flags = Flags::new();
    for id in ids {
        ctx.progress
            .increase_step(Some(&ctx.batch.file(id).path().to_string_lossy()));
        ctx.checkpoint().await?;

        let file = ctx.batch.file(id);
        if !file.profile().tags || !file.profile().rotate {
            continue;
        }
        if matches!(file.orientation(), None | Some(0) | Some(1)) {
            continue;
        }
        flags.entry(file.root().to_string()).or_default().push(id);
    }
    Ok(flags)
}
