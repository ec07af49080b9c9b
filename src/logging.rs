// src/logging.rs
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

pub(crate) const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

pub(crate) const SOURCE_ENV: &str = "RUST_LOG environment variable";
pub(crate) const SOURCE_CLI: &str = "--log-level";
pub(crate) const SOURCE_CONFIG: &str = "config file";
pub(crate) const SOURCE_DEFAULT: &str = "hardcoded default";
pub(crate) const SOURCE_INVALID: &str = "hardcoded default (due to invalid level)";

fn default_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).parse_lossy("")
}

// Returns the filter, the effective level as text and where it came from.
// RUST_LOG wins, then the command line, then the config file.
pub(crate) fn determine_filter_and_source(
    level_from_cli: Option<&str>,
    level_from_config: Option<&str>,
) -> (EnvFilter, String, &'static str) {
    if let Ok(env_value) = std::env::var("RUST_LOG") {
        if !env_value.is_empty() {
            return (EnvFilter::new(&env_value), env_value, SOURCE_ENV);
        }
    }

    let (requested, source) = match (level_from_cli, level_from_config) {
        (Some(cli), _) => (cli, SOURCE_CLI),
        (None, Some(cfg)) => (cfg, SOURCE_CONFIG),
        (None, None) => {
            return (default_filter(DEFAULT_LOG_LEVEL), DEFAULT_LOG_LEVEL.to_string(), SOURCE_DEFAULT)
        }
    };

    match LevelFilter::from_str(requested.trim()) {
        Ok(level) => (default_filter(level), level.to_string(), source),
        Err(_) => (default_filter(DEFAULT_LOG_LEVEL), DEFAULT_LOG_LEVEL.to_string(), SOURCE_INVALID),
    }
}

/// Installs the global subscriber. Logs go to stderr so that command output
/// on stdout stays clean. Calling it again is a no-op.
pub fn init_logging(level_from_cli: Option<&str>, level_from_config: Option<&str>) {
    let (filter, effective_level, source) = determine_filter_and_source(level_from_cli, level_from_config);

    if source == SOURCE_INVALID {
        let invalid = level_from_cli.or(level_from_config).unwrap_or_default();
        eprintln!("Warning: invalid log level '{}'. Using '{}'.", invalid, DEFAULT_LOG_LEVEL);
    }

    let filter_text = filter.to_string();
    let formatter = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_ansi(true)
        .with_span_events(FmtSpan::CLOSE);

    if tracing_subscriber::registry().with(filter).with(formatter).try_init().is_ok() {
        info!(
            "Logging initialized. Level '{}' (source: {}). Filter: '{}'",
            effective_level, source, filter_text
        );
    }
}
