//! Logging initialization.
//!
//! Log output goes to stderr; stdout carries dry-run previews and config
//! output. `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem with a default filter directive and
/// either JSON or human-readable output.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(console::colors_enabled_stderr()),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section. `--verbose` forces
/// debug, `--json-logs` forces JSON.
pub fn init_from_config(
    config: &mediabatch_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let (level, json_format) = settings(config, verbose_override, json_logs_override);
    init(level, json_format);
}

fn settings(
    config: &mediabatch_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) -> (&str, bool) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    (level, json_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = mediabatch_core::Config::default();
        config.logging.level = "warn".to_string();
        assert_eq!(settings(&config, false, false), ("warn", false));
        assert_eq!(settings(&config, true, true), ("debug", true));

        config.logging.format = "json".to_string();
        assert_eq!(settings(&config, false, false), ("warn", true));
    }
}
