//! Batch engine: lifecycle, numbering, rename ordering and execution.

use chrono::NaiveDateTime;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::action::Action;
use crate::batch::{Batch, FileId, Grouping, NameTemplate};
use crate::capability::Capabilities;
use crate::config::{require_captures, BatchOptions, Config};
use crate::error::{BatchError, Result};
use crate::pipeline::discovery::{self, common_root, normalize_input, relative_to};
use crate::pipeline::{CheckKind, CheckPipeline, Context, FatalityPolicy};
use crate::progress::ProgressSink;
use crate::rename::{RenameRequest, RenameResolver, Resolution, Step};
use crate::scheduler::{BatchControl, Scheduler};
use crate::types::{BatchSummary, Operation, PlanStatus, PlannedRename, Sorting, TAG_KEYS};

/// Lifecycle state of a [`BatchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Unconfigured,
    Configured,
    Prepared,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Unconfigured => "unconfigured",
            BatchState::Configured => "configured",
            BatchState::Prepared => "prepared",
            BatchState::Executing => "executing",
            BatchState::Completed => "completed",
            BatchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Options of the configured run with their compiled forms.
#[derive(Debug)]
struct Setup {
    options: BatchOptions,
    template: NameTemplate,
    base_pattern: Regex,
}

/// Runs one batch over a set of inputs.
///
/// `configure` validates the batch options, `prepare` discovers the files and
/// runs the checks, and `execute` runs the decided actions followed, for a
/// rename, by numbering, rename ordering, tagging and the renames
/// themselves. Decisions, base name, counter and sorting can be changed
/// between `prepare` and `execute`; [`preview`](Self::preview) shows their
/// effect without touching any file.
pub struct BatchEngine {
    config: Config,
    caps: Capabilities,
    progress: Arc<dyn ProgressSink>,
    control: BatchControl,
    pipeline: CheckPipeline,
    inputs: Vec<PathBuf>,
    common_root: Option<PathBuf>,
    setup: Option<Setup>,
    batch: Batch,
    base: String,
    state: BatchState,
    summary: BatchSummary,
}

impl BatchEngine {
    /// Create an engine for user inputs (paths or `file://` URIs).
    pub fn new(
        config: Config,
        caps: Capabilities,
        progress: Arc<dyn ProgressSink>,
        inputs: &[String],
    ) -> Self {
        let inputs: Vec<PathBuf> = inputs.iter().filter_map(|i| normalize_input(i)).collect();
        let common_root = common_root(caps.fs.as_ref(), &inputs);
        let pipeline = CheckPipeline::new(FatalityPolicy::new(config.pipeline.fatal.clone()));
        Self {
            config,
            caps,
            progress,
            control: BatchControl::new(),
            pipeline,
            inputs,
            common_root,
            setup: None,
            batch: Batch::new(Grouping::default()),
            base: String::new(),
            state: BatchState::Unconfigured,
            summary: BatchSummary::default(),
        }
    }

    /// Handle to pause, resume or cancel the running operation.
    pub fn control(&self) -> BatchControl {
        self.control.clone()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Deepest directory containing every input.
    pub fn common_root(&self) -> Option<&Path> {
        self.common_root.as_deref()
    }

    /// Path relative to the common root, for display.
    pub fn display_path<'a>(&self, path: &'a Path) -> &'a Path {
        relative_to(path, self.common_root.as_deref())
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn options(&self) -> Option<&BatchOptions> {
        self.setup.as_ref().map(|s| &s.options)
    }

    pub fn pipeline(&self) -> &CheckPipeline {
        &self.pipeline
    }

    /// Base name used for every group; empty means each group's own.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Counts of the last completed run.
    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    /// Forget options and files and rearm the control handle.
    pub fn reset(&mut self) {
        self.setup = None;
        self.batch = Batch::new(Grouping::default());
        self.base.clear();
        self.summary = BatchSummary::default();
        self.state = BatchState::Unconfigured;
        self.control.rearm();
    }

    /// Validate and store the options of the next run.
    pub fn configure(&mut self, options: BatchOptions) -> Result<()> {
        self.expect_state("configure", &[BatchState::Unconfigured, BatchState::Configured])?;
        options.validate()?;

        let grouping = Grouping::new(options.allow_subgroups, &options.grouppattern)?;
        let template = NameTemplate::parse(&options.format)?;
        let base_pattern = require_captures("basepattern", &options.basepattern, &["base"])?;

        tracing::debug!("Configured {} batch: {:?}", options.command, options);
        self.batch = Batch::new(grouping);
        self.setup = Some(Setup {
            options,
            template,
            base_pattern,
        });
        self.state = BatchState::Configured;
        Ok(())
    }

    /// Discover the files, read their tags, run the checks and compute the
    /// default base name.
    pub async fn prepare(&mut self) -> Result<()> {
        self.expect_state("prepare", &[BatchState::Configured])?;
        let start = Instant::now();
        let result = self.run_prepare().await;
        if result.is_ok() {
            tracing::debug!(
                "Prepared {} file(s) in {} group(s) in {:?}",
                self.batch.len(),
                self.batch.group_count(),
                start.elapsed()
            );
        }
        self.conclude(result, BatchState::Prepared)
    }

    async fn run_prepare(&mut self) -> Result<()> {
        let setup = self.setup.as_ref().ok_or(BatchError::InvalidState {
            operation: "prepare",
            state: self.state,
        })?;
        let mut scheduler = Scheduler::new(&self.config.scheduler, self.control.clone());
        let mut ctx = Context {
            batch: &mut self.batch,
            caps: &self.caps,
            config: &self.config,
            options: &setup.options,
            progress: self.progress.as_ref(),
            scheduler: &mut scheduler,
        };
        ctx.progress.set_title(&title(setup.options.command, self.common_root.as_deref()));
        ctx.progress.set_visible(true);

        discovery::discover(&mut ctx, &self.inputs).await?;

        let ids: Vec<FileId> = ctx.batch.files().map(|(id, _)| id).collect();
        ctx.progress.set_step("Reading image tags ...", ids.len());
        for id in ids {
            ctx.progress
                .increase_step(Some(&ctx.batch.file(id).path().to_string_lossy()));
            ctx.checkpoint().await?;
            ctx.batch
                .file_mut(id)
                .init(ctx.caps.fs.as_ref(), ctx.caps.metadata.as_ref());
        }

        self.pipeline.run_checks(&mut ctx).await?;
        self.base = ctx.batch.default_base(&setup.base_pattern);
        Ok(())
    }

    /// Override the decision of one flagged file.
    pub fn set_decision(&mut self, id: FileId, check: CheckKind, action: Action) -> Result<()> {
        self.expect_state("change decisions", &[BatchState::Prepared])?;
        if !check.allows(action) {
            return Err(BatchError::InvalidDecision {
                check,
                action: action.to_string(),
            });
        }
        if !self.batch.is_flagged(check, id) {
            return Err(BatchError::NotFlagged {
                check,
                path: self.batch.file(id).path().to_path_buf(),
            });
        }
        self.batch.file_mut(id).decisions.set(check, Some(action));
        Ok(())
    }

    /// Override the decision of every file a check flagged. Returns how
    /// many files changed.
    pub fn set_decisions(&mut self, check: CheckKind, action: Action) -> Result<usize> {
        let ids = self.batch.flagged(check);
        for id in &ids {
            self.set_decision(*id, check, action)?;
        }
        Ok(ids.len())
    }

    pub fn set_base(&mut self, base: impl Into<String>) -> Result<()> {
        self.expect_state("change the base name", &[BatchState::Configured, BatchState::Prepared])?;
        self.base = base.into();
        Ok(())
    }

    pub fn set_counter(&mut self, counter: u64) -> Result<()> {
        self.setup_mut("change the counter")?.options.counter = counter;
        Ok(())
    }

    pub fn set_sorting(&mut self, sorting: Sorting) -> Result<()> {
        self.setup_mut("change the sorting")?.options.sorting = sorting;
        Ok(())
    }

    /// Planned outcome per batch file under the current settings. Numbers
    /// the groups and resolves the rename order but touches no file.
    pub async fn preview(&mut self) -> Result<Vec<PlannedRename>> {
        self.expect_state("preview", &[BatchState::Prepared])?;
        let result = self.run_preview().await;
        self.conclude(result, BatchState::Prepared)
    }

    async fn run_preview(&mut self) -> Result<Vec<PlannedRename>> {
        let setup = self.setup.as_ref().ok_or(BatchError::InvalidState {
            operation: "preview",
            state: self.state,
        })?;
        let mut scheduler = Scheduler::new(&self.config.scheduler, self.control.clone());
        let mut ctx = Context {
            batch: &mut self.batch,
            caps: &self.caps,
            config: &self.config,
            options: &setup.options,
            progress: self.progress.as_ref(),
            scheduler: &mut scheduler,
        };

        let renaming = setup.options.command == Operation::Rename;
        if renaming {
            assign_numbers(&mut ctx, &self.base, &setup.base_pattern).await?;
            resolve_order(&mut ctx, &setup.template).await?;
        }

        let batch = &*ctx.batch;
        let rows = batch
            .files()
            .map(|(id, file)| {
                let date = file.group().and_then(|gid| batch.group_creation_time(gid));
                let row = |destination, status, reason| PlannedRename {
                    source: file.path().to_path_buf(),
                    destination,
                    status,
                    reason,
                    date,
                };
                if batch.is_deleted(id) {
                    return row(None, PlanStatus::Delete, None);
                }
                if !renaming {
                    return row(None, PlanStatus::Unchanged, None);
                }
                let destination = batch.destination(id, &setup.template);
                match file.rename_issue() {
                    Some(issue) => row(Some(destination), PlanStatus::Error, Some(issue.to_string())),
                    None if destination == file.path() => {
                        row(Some(destination), PlanStatus::Unchanged, None)
                    }
                    None => row(Some(destination), PlanStatus::Rename, None),
                }
            })
            .collect();
        Ok(rows)
    }

    /// Run the decided actions and, for a rename, rename the batch files.
    pub async fn execute(&mut self) -> Result<BatchSummary> {
        self.expect_state("execute", &[BatchState::Prepared])?;
        self.state = BatchState::Executing;
        let start = Instant::now();
        let result = self.run_execute().await;
        if let Ok(summary) = &result {
            self.summary = *summary;
            tracing::info!(
                "Batch finished in {:?}: {} renamed, {} deleted",
                start.elapsed(),
                summary.renamed,
                summary.deleted
            );
        }
        self.conclude(result, BatchState::Completed)
    }

    async fn run_execute(&mut self) -> Result<BatchSummary> {
        let setup = self.setup.as_ref().ok_or(BatchError::InvalidState {
            operation: "execute",
            state: self.state,
        })?;
        let mut scheduler = Scheduler::new(&self.config.scheduler, self.control.clone());
        let mut ctx = Context {
            batch: &mut self.batch,
            caps: &self.caps,
            config: &self.config,
            options: &setup.options,
            progress: self.progress.as_ref(),
            scheduler: &mut scheduler,
        };
        ctx.progress.set_visible(true);

        self.pipeline.execute(&mut ctx).await?;

        let mut summary = BatchSummary {
            files: ctx.batch.len(),
            groups: ctx.batch.group_count(),
            renamed: 0,
            deleted: ctx.batch.files().filter(|(id, _)| ctx.batch.is_deleted(*id)).count(),
        };

        if setup.options.command == Operation::Rename {
            assign_numbers(&mut ctx, &self.base, &setup.base_pattern).await?;
            let resolution = resolve_order(&mut ctx, &setup.template).await?;
            if !resolution.is_ok() {
                let mut problems: Vec<(FileId, String)> = resolution
                    .issues
                    .iter()
                    .map(|(id, issue)| (*id, issue.to_string()))
                    .collect();
                problems.sort();
                for (id, issue) in &problems {
                    let path = ctx.batch.file(*id).path();
                    let shown = relative_to(path, self.common_root.as_deref());
                    ctx.progress.output(&format!("{}: {}\n", shown.display(), issue));
                }
                return Err(BatchError::RenameOrder {
                    count: problems.len(),
                });
            }
            if let Some(tag) = &setup.options.tag {
                assign_tag(&mut ctx, tag).await?;
            }
            summary.renamed = rename_files(&mut ctx, &resolution.order, &setup.template).await?;
        }
        Ok(summary)
    }

    fn expect_state(&self, operation: &'static str, allowed: &[BatchState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BatchError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn setup_mut(&mut self, operation: &'static str) -> Result<&mut Setup> {
        self.expect_state(operation, &[BatchState::Configured, BatchState::Prepared])?;
        let state = self.state;
        self.setup
            .as_mut()
            .ok_or(BatchError::InvalidState { operation, state })
    }

    fn conclude<T>(&mut self, result: Result<T>, next: BatchState) -> Result<T> {
        match &result {
            Ok(_) => self.state = next,
            Err(e) => {
                self.state = BatchState::Failed;
                tracing::error!("Batch failed: {}", e);
                self.progress.output(&format!("\n{e}\n\n"));
            }
        }
        self.progress.set_visible(false);
        result
    }
}

impl fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchEngine")
            .field("state", &self.state)
            .field("inputs", &self.inputs)
            .field("base", &self.base)
            .field("files", &self.batch.len())
            .finish_non_exhaustive()
    }
}

fn title(operation: Operation, root: Option<&Path>) -> String {
    match root {
        Some(root) => format!("Image batch {} in {}", operation, root.display()),
        None => format!("Image batch {}", operation),
    }
}

/// Give every group its base and number. Numbers count up from the
/// configured counter in name or date order; groups whose files are all
/// deleted get a number without consuming it.
async fn assign_numbers(ctx: &mut Context<'_>, base: &str, base_pattern: &Regex) -> Result<()> {
    let mut groups: Vec<_> = ctx
        .batch
        .groups()
        .map(|(gid, group)| (gid, group.key().to_string(), None::<NaiveDateTime>))
        .collect();
    if ctx.options.sorting == Sorting::Date {
        for (gid, _, date) in &mut groups {
            *date = ctx.batch.group_creation_time(*gid);
        }
        groups.sort_by(|a, b| (a.2, &a.1).cmp(&(b.2, &b.1)));
    }
    ctx.progress.set_step("Numbering file groups ...", groups.len());

    let mut number = ctx.options.counter;
    for (gid, key, _) in groups {
        ctx.progress.increase_step(Some(&key));
        ctx.checkpoint().await?;

        let group_base = if base.is_empty() {
            ctx.batch.group_base(gid, base_pattern)
        } else {
            base.to_string()
        };
        let all_deleted = ctx
            .batch
            .group(gid)
            .members()
            .iter()
            .all(|id| ctx.batch.is_deleted(*id));
        ctx.batch.group_mut(gid).assign(group_base, number);
        if !all_deleted {
            number += 1;
        }
    }
    Ok(())
}

/// Resolve the rename order of the batch files that are not deleted and
/// record the issues on the files.
async fn resolve_order(ctx: &mut Context<'_>, template: &NameTemplate) -> Result<Resolution<FileId>> {
    let ids: Vec<FileId> = ctx.batch.files().map(|(id, _)| id).collect();
    ctx.progress.set_step("Calculating rename order ...", ids.len());

    let mut requests = Vec::with_capacity(ids.len());
    for id in ids {
        ctx.progress
            .increase_step(Some(&ctx.batch.file(id).path().to_string_lossy()));
        ctx.checkpoint().await?;
        ctx.batch.file_mut(id).rename_issue = None;
        if ctx.batch.is_deleted(id) {
            continue;
        }
        requests.push(RenameRequest {
            key: id,
            source: ctx.batch.file(id).path().to_path_buf(),
            destination: ctx.batch.destination(id, template),
        });
    }

    let fs = ctx.caps.fs.clone();
    let mut resolver = RenameResolver::new(requests, |path| fs.exists(path));
    while resolver.step() == Step::Continue {
        ctx.checkpoint().await?;
    }
    let resolution = resolver.finish();

    for (id, issue) in &resolution.issues {
        ctx.batch.file_mut(*id).rename_issue = Some(issue.clone());
    }
    tracing::debug!(
        "Rename order: {} file(s), {} problem(s)",
        resolution.order.len(),
        resolution.issues.len()
    );
    Ok(resolution)
}

/// Append the batch tag to the keyword lists of every remaining file that
/// carries tags.
async fn assign_tag(ctx: &mut Context<'_>, tag: &str) -> Result<()> {
    let ids: Vec<FileId> = ctx.batch.files().map(|(id, _)| id).collect();
    ctx.progress.set_step("Assigning tag ...", ids.len());

    for id in ids {
        ctx.progress
            .increase_step(Some(&ctx.batch.file(id).path().to_string_lossy()));
        ctx.checkpoint().await?;
        if ctx.batch.is_deleted(id) || !ctx.batch.file(id).profile().tags {
            continue;
        }
        let Some(store) = ctx.batch.file_mut(id).tags_mut() else {
            continue;
        };
        for key in TAG_KEYS {
            let mut values = store.get_multiple(key);
            if !values.iter().any(|v| v == tag) {
                values.push(tag.to_string());
                store.set_multiple(key, &values);
            }
        }
        store.save().await?;
    }
    Ok(())
}

/// Rename files in resolved order, skipping deleted and unchanged ones.
async fn rename_files(
    ctx: &mut Context<'_>,
    order: &[FileId],
    template: &NameTemplate,
) -> Result<usize> {
    ctx.progress.set_step("Renaming files ...", order.len());

    let mut renamed = 0;
    for id in order {
        let source = ctx.batch.file(*id).path().to_path_buf();
        ctx.progress.increase_step(Some(&source.to_string_lossy()));
        ctx.checkpoint().await?;
        if ctx.batch.is_deleted(*id) {
            continue;
        }
        let destination = ctx.batch.destination(*id, template);
        if destination == source {
            continue;
        }
        ctx.caps
            .fs
            .rename(&source, &destination)
            .map_err(|e| BatchError::Rename {
                from: source.clone(),
                to: destination.clone(),
                source: e,
            })?;
        tracing::info!("Renamed {} to {}", source.display(), destination.display());
        renamed += 1;
    }
    Ok(renamed)
}
