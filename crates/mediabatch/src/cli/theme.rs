//! Terminal styling shared by the prompts, the progress display and the
//! summary.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// Prompt theme for the decision review.
pub fn review_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().cyan(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        active_item_prefix: style("▸".to_string()).for_stderr().cyan(),
        active_item_style: Style::new().for_stderr().cyan(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

pub fn heading() -> Style {
    Style::new().for_stderr().cyan().bold()
}

pub fn dim() -> Style {
    Style::new().for_stderr().dim()
}

pub fn warn() -> Style {
    Style::new().for_stderr().yellow()
}

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
pub fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}
