//! Check pipeline: discovery, the file checks and their action execution.
//!
//! Checks run once per batch in a fixed order. Each inspects the batch and
//! flags files, grouped by root; a flagged file carries a decision (an
//! [`Action`]) for that check, preset from its extension profile. Executing
//! a check runs the decided action for every flagged file.

pub mod discovery;

mod creation_time;
mod new_group;
mod only_raw;
mod rotate;
mod unselected;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::action::Action;
use crate::batch::{Batch, Flags};
use crate::capability::Capabilities;
use crate::config::{BatchOptions, Config, FatalRule};
use crate::error::{ActionError, BatchError, Result};
use crate::progress::ProgressSink;
use crate::scheduler::{Cancelled, Scheduler};
use crate::types::Operation;

/// The file checks, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Siblings of batch files that were not selected
    Unselected,
    /// Raw files without a result file
    OnlyRaw,
    /// Images with an orientation tag
    Rotate,
    /// Groups of panorama/HDR parts without a result file
    NewFileGroup,
    /// Files missing creation times other group members have
    CreationTime,
}

impl CheckKind {
    /// Registration order.
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Unselected,
        CheckKind::OnlyRaw,
        CheckKind::Rotate,
        CheckKind::NewFileGroup,
        CheckKind::CreationTime,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Unselected => "Unselected files",
            CheckKind::OnlyRaw => "Single RAW files",
            CheckKind::Rotate => "Rotate",
            CheckKind::NewFileGroup => "New file group",
            CheckKind::CreationTime => "Missing creation time",
        }
    }

    /// Identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            CheckKind::Unselected => "unselected",
            CheckKind::OnlyRaw => "only-raw",
            CheckKind::Rotate => "rotate",
            CheckKind::NewFileGroup => "new-file-group",
            CheckKind::CreationTime => "creation-time",
        }
    }

    /// Actions a decision for this check may take, preferred first.
    pub fn possible_actions(&self) -> &'static [Action] {
        match self {
            CheckKind::Unselected => &[Action::Include, Action::Ignore],
            CheckKind::OnlyRaw => &[Action::Trash, Action::Convert, Action::Ignore],
            CheckKind::Rotate => &[Action::Rotate, Action::Ignore],
            CheckKind::NewFileGroup => &[Action::ConvertGroup, Action::Ignore],
            CheckKind::CreationTime => &[Action::SetCreationTime, Action::Ignore],
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.possible_actions().contains(&action)
    }

    async fn run(&self, ctx: &mut Context<'_>) -> Result<Flags> {
        match self {
            CheckKind::Unselected => unselected::run(ctx).await,
            CheckKind::OnlyRaw => only_raw::run(ctx).await,
            CheckKind::Rotate => rotate::run(ctx).await,
            CheckKind::NewFileGroup => new_group::run(ctx).await,
            CheckKind::CreationTime => creation_time::run(ctx).await,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|check| check.id() == s)
            .ok_or_else(|| format!("unknown check '{s}'"))
    }
}

/// One optional decision per check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decisions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unselected: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_raw: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_file_group: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<Action>,
}

impl Decisions {
    pub fn get(&self, check: CheckKind) -> Option<Action> {
        match check {
            CheckKind::Unselected => self.unselected,
            CheckKind::OnlyRaw => self.only_raw,
            CheckKind::Rotate => self.rotate,
            CheckKind::NewFileGroup => self.new_file_group,
            CheckKind::CreationTime => self.creation_time,
        }
    }

    pub fn set(&mut self, check: CheckKind, action: Option<Action>) {
        let slot = match check {
            CheckKind::Unselected => &mut self.unselected,
            CheckKind::OnlyRaw => &mut self.only_raw,
            CheckKind::Rotate => &mut self.rotate,
            CheckKind::NewFileGroup => &mut self.new_file_group,
            CheckKind::CreationTime => &mut self.creation_time,
        };
        *slot = action;
    }

    /// Effective decisions for a run: outside post-processing, actions that
    /// belong to post-processing become Ignore; a missing default is Ignore.
    pub fn for_mode(&self, postprocessing: bool) -> Self {
        let mut decisions = Self::default();
        for check in CheckKind::ALL {
            let action = match self.get(check) {
                Some(action) if action.is_postprocessing() && !postprocessing => Action::Ignore,
                Some(action) => action,
                None => Action::Ignore,
            };
            decisions.set(check, Some(action));
        }
        decisions
    }
}

/// Decides whether an action failure aborts the batch.
#[derive(Debug, Clone, Default)]
pub struct FatalityPolicy {
    rules: Vec<FatalRule>,
}

impl FatalityPolicy {
    pub fn new(rules: Vec<FatalRule>) -> Self {
        Self { rules }
    }

    pub fn is_fatal(&self, check: CheckKind, action: Action, error: &ActionError) -> bool {
        let kind = error.kind();
        self.rules.iter().any(|rule| {
            rule.check == check
                && rule.action.map_or(true, |a| a == action)
                && rule.error.map_or(true, |k| k == kind)
        })
    }
}

/// Everything a check or action works with.
pub(crate) struct Context<'a> {
    pub batch: &'a mut Batch,
    pub caps: &'a Capabilities,
    pub config: &'a Config,
    pub options: &'a BatchOptions,
    pub progress: &'a dyn ProgressSink,
    pub scheduler: &'a mut Scheduler,
}

impl Context<'_> {
    pub fn postprocessing(&self) -> bool {
        self.options.command == Operation::Postprocess
    }

    pub async fn checkpoint(&mut self) -> std::result::Result<(), Cancelled> {
        self.scheduler.checkpoint().await
    }
}

/// Ordered checks plus the fatality policy applied while executing them.
#[derive(Debug, Clone)]
pub struct CheckPipeline {
    checks: Vec<CheckKind>,
    fatality: FatalityPolicy,
}

impl Default for CheckPipeline {
    fn default() -> Self {
        Self::new(FatalityPolicy::default())
    }
}

impl CheckPipeline {
    /// All checks in registration order.
    pub fn new(fatality: FatalityPolicy) -> Self {
        Self {
            checks: CheckKind::ALL.to_vec(),
            fatality,
        }
    }

    pub fn checks(&self) -> &[CheckKind] {
        &self.checks
    }

    /// Run every check and record its flags in the batch.
    pub(crate) async fn run_checks(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.batch.clear_flags();
        for check in &self.checks {
            let flags = check.run(ctx).await?;
            tracing::debug!(
                "{} check flagged {} file(s)",
                check,
                flags.values().map(Vec::len).sum::<usize>()
            );
            ctx.batch.record_flags(*check, flags);
        }
        Ok(())
    }

    /// Run every check's actions. Failures of one check do not stop the
    /// others; the counts are summed into one error at the end.
    pub(crate) async fn execute(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut errors = 0;
        for check in &self.checks {
            match self.execute_actions(*check, ctx).await {
                Ok(()) => {}
                Err(BatchError::CheckFailed { check, count }) => {
                    tracing::error!("{} check: {} action(s) failed", check, count);
                    errors += count;
                }
                Err(e) => return Err(e),
            }
        }
        if errors > 0 {
            return Err(BatchError::Aggregate { count: errors });
        }
        Ok(())
    }

    /// Run the decided action for every file one check flagged.
    pub(crate) async fn execute_actions(&self, check: CheckKind, ctx: &mut Context<'_>) -> Result<()> {
        let flags = ctx.batch.flags(check).cloned().unwrap_or_default();
        ctx.progress.set_step(
            &format!("Executing actions for {check} check ..."),
            flags.len(),
        );

        let mut errors = 0;
        for (root, ids) in flags {
            ctx.progress.increase_step(Some(&root));
            for id in ids {
                ctx.checkpoint().await?;
                let action = ctx.batch.file(id).decision(check).unwrap_or(Action::Ignore);
                let path = ctx.batch.file(id).path().to_path_buf();
                tracing::info!("{}: action {} for {}", check, action, path.display());

                match action.execute(id, ctx).await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => return Err(BatchError::Cancelled),
                    Err(e) if self.fatality.is_fatal(check, action, &e) => {
                        return Err(BatchError::Action {
                            check,
                            path,
                            source: e,
                        });
                    }
                    Err(e) => {
                        tracing::warn!("{} failed for {}: {}", action, path.display(), e);
                        ctx.progress.output(&format!("\n{e}\n\n"));
                        errors += 1;
                    }
                }
            }
        }

        if errors > 0 {
            return Err(BatchError::CheckFailed {
                check,
                count: errors,
            });
        }
        Ok(())
    }
}
