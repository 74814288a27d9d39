//! Actions a check decision can take for a flagged file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::batch::{FileEntry, FileId};
use crate::capability::Invocation;
use crate::config::ToolsConfig;
use crate::error::{ActionError, ActionResult};
use crate::pipeline::Context;
use crate::types::{MediaType, Stage, EXIF_TIME_FORMAT};

/// What happens to a flagged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Move to the trash, deleting when no trash is available
    Trash,
    /// Develop a raw image or recode a raw video
    Convert,
    /// Rotate losslessly according to the orientation tag
    Rotate,
    /// Assemble a panorama or HDR image from the group members
    ConvertGroup,
    /// Add an unselected file to the batch
    Include,
    /// Do nothing
    Ignore,
    /// Write the creation times collected from the group
    SetCreationTime,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Trash,
        Action::Convert,
        Action::Rotate,
        Action::ConvertGroup,
        Action::Include,
        Action::Ignore,
        Action::SetCreationTime,
    ];

    /// Identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            Action::Trash => "trash",
            Action::Convert => "convert",
            Action::Rotate => "rotate",
            Action::ConvertGroup => "convert-group",
            Action::Include => "include",
            Action::Ignore => "ignore",
            Action::SetCreationTime => "set-creation-time",
        }
    }

    /// Description for display, with file details where there are any.
    pub fn text(&self, file: Option<&FileEntry>) -> String {
        match self {
            Action::Trash => "Trash file".to_string(),
            Action::Convert => "Convert file".to_string(),
            Action::Rotate => "Rotate file".to_string(),
            Action::ConvertGroup => "Convert file group".to_string(),
            Action::Include => "Include file".to_string(),
            Action::Ignore => "Ignore file".to_string(),
            Action::SetCreationTime => {
                let details: Vec<String> = file
                    .map(|f| {
                        f.fill_times()
                            .iter()
                            .map(|(key, time)| format!("{key:?} = {time}"))
                            .collect()
                    })
                    .unwrap_or_default();
                if details.is_empty() {
                    "Set by file group".to_string()
                } else {
                    format!("Set by file group: {}", details.join(", "))
                }
            }
        }
    }

    /// Whether the action belongs to post-processing. Outside
    /// post-processing such defaults are downgraded to Ignore.
    pub fn is_postprocessing(&self) -> bool {
        matches!(
            self,
            Action::Convert | Action::Rotate | Action::ConvertGroup | Action::SetCreationTime
        )
    }

    pub(crate) async fn execute(self, id: FileId, ctx: &mut Context<'_>) -> ActionResult<()> {
        match self {
            Action::Ignore => {
                ctx.checkpoint().await?;
                Ok(())
            }
            Action::Include => {
                ctx.batch.add_file(id);
                Ok(())
            }
            Action::Trash => {
                let path = ctx.batch.file(id).path().to_path_buf();
                ctx.caps
                    .fs
                    .trash(&path, true)
                    .map_err(|source| ActionError::Io {
                        operation: "trash",
                        path: path.clone(),
                        source,
                    })?;
                tracing::info!("Trashed {}", path.display());
                Ok(())
            }
            Action::Convert => {
                let file = ctx.batch.file(id);
                let profile = file.profile();
                let tool = match (profile.media_type, profile.stage) {
                    (MediaType::Image, Stage::Raw) => &ctx.config.tools.convert_raw,
                    (MediaType::Video, Stage::Raw) => &ctx.config.tools.recode_video,
                    _ => {
                        return Err(ActionError::Unsupported {
                            extension: file.extension().to_string(),
                        })
                    }
                };
                let invocation =
                    Invocation::from_command(&ToolsConfig::expand(tool)).arg(file.location());
                run_tool(ctx, &invocation).await
            }
            Action::Rotate => {
                let invocation = Invocation::from_command(&ToolsConfig::expand(
                    &ctx.config.tools.rotate,
                ))
                .arg(ctx.batch.file(id).location());
                run_tool(ctx, &invocation).await
            }
            Action::ConvertGroup => convert_group(id, ctx).await,
            Action::SetCreationTime => set_creation_time(id, ctx).await,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.id() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

async fn run_tool(ctx: &mut Context<'_>, invocation: &Invocation) -> ActionResult<()> {
    ctx.caps
        .commands
        .run(invocation, ctx.progress, ctx.scheduler.control())
        .await?;
    Ok(())
}

/// Stitch the members of a synthesized group result. All members must be
/// tagged as panorama parts, or all as HDR parts.
async fn convert_group(id: FileId, ctx: &mut Context<'_>) -> ActionResult<()> {
    let members = ctx.batch.file(id).members().to_vec();
    let panorama_tag = ctx.config.tools.panorama_tag.clone();
    let hdr_tag = ctx.config.tools.hdr_tag.clone();

    let mut panorama = 0;
    let mut hdr = 0;
    let mut paths = Vec::with_capacity(members.len());
    for member in &members {
        ctx.checkpoint().await?;
        let file = ctx.batch.file(*member);
        paths.push(file.location());
        let keywords = file.keywords();
        if keywords.contains(&panorama_tag) {
            panorama += 1;
        }
        if keywords.contains(&hdr_tag) {
            hdr += 1;
        }
    }

    let mode = if panorama == members.len() && hdr == 0 {
        "-p"
    } else if hdr == members.len() && panorama == 0 {
        "-h"
    } else {
        return Err(ActionError::InconsistentTags {
            group: ctx.batch.file(id).group_key().to_string(),
        });
    };

    let invocation = Invocation::from_command(&ToolsConfig::expand(&ctx.config.tools.postprocess))
        .arg(mode)
        .arg("-o")
        .arg(ctx.batch.file(id).location())
        .args(paths);
    run_tool(ctx, &invocation).await
}

async fn set_creation_time(id: FileId, ctx: &mut Context<'_>) -> ActionResult<()> {
    let fill = ctx.batch.file(id).fill_times().clone();
    if fill.is_empty() {
        return Ok(());
    }
    let path = ctx.batch.file(id).path().to_path_buf();

    for (key, time) in &fill {
        let store = ctx
            .batch
            .file_mut(id)
            .tags_mut()
            .ok_or_else(|| ActionError::NoMetadata(path.clone()))?;
        store.set_string(key.tag(), &time.format(EXIF_TIME_FORMAT).to_string());
        ctx.checkpoint().await?;
    }

    let store = ctx
        .batch
        .file_mut(id)
        .tags_mut()
        .ok_or_else(|| ActionError::NoMetadata(path.clone()))?;
    store.save().await?;
    tracing::info!("Set {} creation time(s) of {}", fill.len(), path.display());
    Ok(())
}
