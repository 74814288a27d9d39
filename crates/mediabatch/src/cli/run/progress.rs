//! Terminal progress display for a running batch.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use mediabatch_core::ProgressSink;

use crate::cli::theme;

/// Progress sink drawing one bar per engine step on stderr. Command output
/// and error text are printed above the bar.
pub struct TerminalProgress {
    bar: ProgressBar,
    visible_target: fn() -> ProgressDrawTarget,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr)
    }

    /// A sink that never draws the bar, for output that is not a terminal.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden)
    }

    fn with_target(visible_target: fn() -> ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} {wide_msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self {
            bar,
            visible_target,
        }
    }

    #[cfg(test)]
    fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn set_title(&self, title: &str) {
        self.bar
            .suspend(|| eprintln!("{}", theme::heading().apply_to(title)));
    }

    fn set_step(&self, text: &str, total: usize) {
        tracing::debug!("{} ({} item(s))", text, total);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(text.to_string());
        self.bar.set_message("");
    }

    fn increase_step(&self, label: Option<&str>) {
        self.bar.inc(1);
        if let Some(label) = label {
            self.bar.set_message(label.to_string());
        }
    }

    fn set_visible(&self, visible: bool) {
        if visible {
            self.bar.set_draw_target((self.visible_target)());
        } else {
            self.bar.set_draw_target(ProgressDrawTarget::hidden());
        }
    }

    fn output(&self, text: &str) {
        self.bar.suspend(|| eprint!("{text}"));
    }
}
