//! Creation times a file lacks but its group knows.

use std::collections::BTreeMap;

use super::Context;
use crate::batch::{FileId, Flags};
use crate::error::Result;
use crate::types::TimeKey;

/// For every tag-bearing file, collect the earliest readable time of each
/// time key the file itself lacks, across its group. Files with anything
/// to fill are flagged.
pub(super) async fn run(ctx: &mut Context<'_>) -> Result<Flags> {
    let groups: Vec<Vec<FileId>> = ctx
        .batch
        .groups()
        .map(|(_, group)| group.members().to_vec())
        .collect();
    ctx.progress
        .set_step("Checking for creation time ...", ctx.batch.len());

    let mut flags = Flags::new();
    for members in groups {
        for id in &members {
            ctx.progress
                .increase_step(Some(&ctx.batch.file(*id).path().to_string_lossy()));
            ctx.checkpoint().await?;

            let file = ctx.batch.file(*id);
            if !file.profile().tags || file.tags().is_none() {
                continue;
            }

            let mut fill = BTreeMap::new();
            for key in TimeKey::ALL {
                if file.has_tag(key.tag()) {
                    continue;
                }
                let earliest = members
                    .iter()
                    .filter_map(|m| ctx.batch.file(*m).exif_time(key))
                    .min();
                if let Some(time) = earliest {
                    fill.insert(key, time);
                }
            }
            if fill.is_empty() {
                continue;
            }

            let root = file.root().to_string();
            ctx.batch.file_mut(*id).fill_times = fill;
            flags.entry(root).or_default().push(*id);
        }
    }
    Ok(flags)
}
