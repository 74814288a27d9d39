//! The `mediabatch rename` and `mediabatch postprocess` commands.

mod progress;
mod review;
pub mod types;

use types::{DecisionOverride, PreviewFormat, RenameMode, SortingArg};

use clap::Args;
use mediabatch_core::{
    BatchEngine, BatchOptions, BatchSummary, Capabilities, Config, Mode, Operation, PlanWriter,
    ProgressSink,
};
use std::io::BufWriter;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::theme;
use progress::TerminalProgress;

/// Arguments shared by both batch commands.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Files, directories or file:// URIs to process
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Show what would happen without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format of the dry-run plan and the final summary
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: PreviewFormat,

    /// Decide an action for every file a check flags (CHECK=ACTION, repeatable)
    #[arg(short, long = "action", value_name = "CHECK=ACTION")]
    pub actions: Vec<DecisionOverride>,

    /// Review the flagged files before running
    #[arg(short, long)]
    pub interactive: bool,

    /// Descend into subdirectories of input directories
    #[arg(short, long)]
    pub recursive: bool,
}

/// Arguments for the `rename` command.
#[derive(Args, Debug)]
pub struct RenameArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Rename preset (defaults to `batch.mode` from the config)
    #[arg(short, long, value_enum)]
    pub mode: Option<RenameMode>,

    /// Base name for every group (defaults to one derived from the files)
    #[arg(short, long)]
    pub base: Option<String>,

    /// First group number
    #[arg(short, long)]
    pub counter: Option<u64>,

    /// Group numbering order (defaults to `batch.sorting` from the config)
    #[arg(short, long, value_enum)]
    pub sorting: Option<SortingArg>,

    /// Keyword added to every renamed file
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Destination name template, e.g. "{directory:s}/{base:s} {counter:03d}{extension:s}"
    #[arg(long)]
    pub name_format: Option<String>,
}

/// Arguments for the `postprocess` command.
#[derive(Args, Debug)]
pub struct PostprocessArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Execute the rename command.
pub async fn execute_rename(args: RenameArgs, config: Config) -> anyhow::Result<()> {
    let options = rename_options(&args, &config)?;
    run_batch(config, options, args.common, args.base).await
}

/// Execute the postprocess command.
pub async fn execute_postprocess(args: PostprocessArgs, config: Config) -> anyhow::Result<()> {
    let options = postprocess_options(&args);
    run_batch(config, options, args.common, None).await
}

/// The postprocess preset already walks directories recursively.
fn postprocess_options(args: &PostprocessArgs) -> BatchOptions {
    let mut options = BatchOptions::preset(Mode::Postprocess);
    options.recursive |= args.common.recursive;
    options
}

fn rename_options(args: &RenameArgs, config: &Config) -> anyhow::Result<BatchOptions> {
    let mode = args.mode.map(Mode::from).unwrap_or(config.batch.mode);
    if mode == Mode::Postprocess {
        anyhow::bail!(
            "batch.mode is 'postprocess' in the config; pass --mode or use `mediabatch postprocess`"
        );
    }

    let mut options = BatchOptions::preset(mode);
    options.sorting = args.sorting.map(Into::into).unwrap_or(config.batch.sorting);
    options.recursive |= args.common.recursive;
    if let Some(counter) = args.counter {
        options.counter = counter;
    }
    if let Some(tag) = &args.tag {
        options.tag = Some(tag.clone()).filter(|t| !t.is_empty());
    }
    if let Some(format) = &args.name_format {
        options.format = format.clone();
    }
    Ok(options)
}

async fn run_batch(
    config: Config,
    options: BatchOptions,
    args: CommonArgs,
    base: Option<String>,
) -> anyhow::Result<()> {
    let caps = Capabilities::local(&config);
    let progress: Arc<dyn ProgressSink> = if console::user_attended_stderr() {
        Arc::new(TerminalProgress::new())
    } else {
        Arc::new(TerminalProgress::hidden())
    };
    let command = options.command;

    let mut engine = BatchEngine::new(config, caps, progress, &args.inputs);
    if engine.inputs().is_empty() {
        anyhow::bail!("No usable inputs in {:?}", args.inputs);
    }
    tracing::info!("Starting {} of {} input(s)", command, engine.inputs().len());

    // Ctrl+C cancels at the next checkpoint and stops a running tool.
    let control = engine.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling batch");
            control.cancel();
        }
    });

    let result = drive(&mut engine, options, args, base).await;
    interrupt.abort();
    result
}

async fn drive(
    engine: &mut BatchEngine,
    options: BatchOptions,
    args: CommonArgs,
    base: Option<String>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let command = options.command;
    engine.configure(options)?;
    engine.prepare().await?;

    if engine.batch().is_empty() {
        tracing::warn!("No supported media files found");
        return Ok(());
    }

    if let Some(base) = base {
        engine.set_base(base)?;
    }
    for o in &args.actions {
        let changed = engine.set_decisions(o.check, o.action)?;
        tracing::debug!("{}={} applied to {} file(s)", o.check, o.action, changed);
    }

    if args.interactive && !review::review(engine)? {
        eprintln!("{}", theme::warn().apply_to("Review aborted, nothing was changed."));
        return Ok(());
    }

    if args.dry_run {
        let rows = engine.preview().await?;
        let stdout = std::io::stdout();
        let mut writer = PlanWriter::new(
            BufWriter::new(stdout.lock()),
            args.format.into(),
            engine.common_root(),
        );
        let renames = writer.write_plan(&rows)?;
        tracing::info!("Dry run: {} of {} file(s) would be renamed", renames, rows.len());
        return Ok(());
    }

    let summary = engine.execute().await?;
    match args.format {
        PreviewFormat::Table => print_summary(command, &summary, start.elapsed()),
        PreviewFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        PreviewFormat::Jsonl => println!("{}", serde_json::to_string(&summary)?),
    }
    Ok(())
}

/// Print a formatted summary table after the batch ran.
fn print_summary(command: Operation, summary: &BatchSummary, elapsed: Duration) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("            {:^12}", format!("{command} summary"));
    eprintln!("  ====================================");
    eprintln!("    Files:        {:>8}", summary.files);
    eprintln!("    Groups:       {:>8}", summary.groups);
    if command == Operation::Rename {
        eprintln!("    Renamed:      {:>8}", summary.renamed);
    }
    if summary.deleted > 0 {
        eprintln!("    Trashed:      {:>8}", summary.deleted);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
