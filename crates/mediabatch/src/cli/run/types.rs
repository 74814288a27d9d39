//! CLI value types for the batch commands: rename mode, sorting, preview
//! format and decision overrides.

use clap::ValueEnum;
use mediabatch_core::{Action, CheckKind, Mode, OutputFormat as CoreOutputFormat, Sorting};
use std::str::FromStr;

/// Rename presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenameMode {
    /// Letter-numbered panorama parts, tagged Panorama
    Panorama,
    /// Letter-numbered HDR parts, tagged HDR
    Hdr,
    /// Three-digit group numbers
    Group,
    /// Group creation time in front of the name
    Date,
}

impl From<RenameMode> for Mode {
    fn from(mode: RenameMode) -> Self {
        match mode {
            RenameMode::Panorama => Mode::Panorama,
            RenameMode::Hdr => Mode::Hdr,
            RenameMode::Group => Mode::Group,
            RenameMode::Date => Mode::Date,
        }
    }
}

/// Group numbering order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortingArg {
    /// By group name
    Name,
    /// By group creation time
    Date,
}

impl From<SortingArg> for Sorting {
    fn from(sorting: SortingArg) -> Self {
        match sorting {
            SortingArg::Name => Sorting::Name,
            SortingArg::Date => Sorting::Date,
        }
    }
}

/// Dry-run output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PreviewFormat {
    /// One line per file
    #[default]
    Table,
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<PreviewFormat> for CoreOutputFormat {
    fn from(format: PreviewFormat) -> Self {
        match format {
            PreviewFormat::Table => CoreOutputFormat::Table,
            PreviewFormat::Json => CoreOutputFormat::Json,
            PreviewFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// `check=action`: decide `action` for every file `check` flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecisionOverride {
    pub check: CheckKind,
    pub action: Action,
}

impl FromStr for DecisionOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (check, action) = s
            .split_once('=')
            .ok_or_else(|| format!("expected CHECK=ACTION, got '{s}'"))?;
        let check: CheckKind = check.trim().parse()?;
        let action: Action = action.trim().parse()?;
        if !check.allows(action) {
            let allowed: Vec<&str> = check.possible_actions().iter().map(|a| a.id()).collect();
            return Err(format!(
                "the {} check allows {}",
                check.id(),
                allowed.join(", ")
            ));
        }
        Ok(Self { check, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_override_parses() {
        let o: DecisionOverride = "only-raw=convert".parse().unwrap();
        assert_eq!(o.check, CheckKind::OnlyRaw);
        assert_eq!(o.action, Action::Convert);
    }

    #[test]
    fn decision_override_rejects_disallowed_action() {
        let err = "rotate=trash".parse::<DecisionOverride>().unwrap_err();
        assert_eq!(err, "the rotate check allows rotate, ignore");
    }

    #[test]
    fn decision_override_rejects_malformed() {
        assert!("only-raw".parse::<DecisionOverride>().is_err());
        assert!("bogus=ignore".parse::<DecisionOverride>().is_err());
    }

    #[test]
    fn preview_format_maps_to_core() {
        assert_eq!(CoreOutputFormat::from(PreviewFormat::Jsonl), CoreOutputFormat::JsonLines);
        assert_eq!(Mode::from(RenameMode::Hdr), Mode::Hdr);
    }
}
