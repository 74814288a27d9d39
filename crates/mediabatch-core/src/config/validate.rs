//! Configuration validation with range and shape checks.

use crate::batch::NameTemplate;
use crate::error::ConfigError;
use regex::Regex;

use super::{BatchOptions, Config};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.slice_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.slice_ms must be > 0".into(),
            ));
        }
        if self.scheduler.pause_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.pause_poll_ms must be > 0".into(),
            ));
        }
        for (name, command) in [
            ("convert_raw", &self.tools.convert_raw),
            ("recode_video", &self.tools.recode_video),
            ("rotate", &self.tools.rotate),
            ("postprocess", &self.tools.postprocess),
        ] {
            if command.first().map_or(true, |program| program.is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "tools.{name} must name a program"
                )));
            }
        }
        if self.tools.exiftool.is_empty() {
            return Err(ConfigError::ValidationError(
                "tools.exiftool must not be empty".into(),
            ));
        }
        if self.tools.panorama_tag.is_empty() || self.tools.hdr_tag.is_empty() {
            return Err(ConfigError::ValidationError(
                "tools.panorama_tag and tools.hdr_tag must not be empty".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "extensions must list at least one file type".into(),
            ));
        }
        for (ext, _) in self.extensions.iter() {
            if ext.is_empty() || ext.contains('.') || ext.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "extensions.{ext} is not a valid extension"
                )));
            }
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}

impl BatchOptions {
    /// Check that the patterns and the name template are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        NameTemplate::parse(&self.format)?;
        require_captures("basepattern", &self.basepattern, &["base"])?;
        if self.allow_subgroups {
            require_captures("grouppattern", &self.grouppattern, &["group", "index"])?;
        }
        if self.tag.as_deref().is_some_and(|tag| tag.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "tag must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Compile `pattern` and make sure it defines every named capture in `names`.
pub(crate) fn require_captures(
    field: &str,
    pattern: &str,
    names: &[&str],
) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ConfigError::ValidationError(format!("{field} is not a valid regex: {e}")))?;
    for name in names {
        if !regex.capture_names().flatten().any(|n| n == *name) {
            return Err(ConfigError::ValidationError(format!(
                "{field} must define the named group '{name}'"
            )));
        }
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_slice() {
        let mut config = Config::default();
        config.scheduler.slice_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("slice_ms"));
    }

    #[test]
    fn test_validate_rejects_missing_tool() {
        let mut config = Config::default();
        config.tools.rotate.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tools.rotate"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_pass_validation() {
        for mode in Mode::ALL {
            BatchOptions::preset(mode).validate().unwrap();
        }
    }

    #[test]
    fn test_options_reject_unknown_placeholder() {
        let options = BatchOptions {
            format: "{directory}/{title}{extension}".into(),
            ..BatchOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_options_reject_pattern_without_base() {
        let options = BatchOptions {
            basepattern: r"^(.*)$".into(),
            ..BatchOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("base"));
    }

    #[test]
    fn test_options_reject_broken_regex() {
        let options = BatchOptions {
            grouppattern: r"^(?P<group>.*".into(),
            ..BatchOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
