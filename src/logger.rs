//! Logging setup.
//!
//! Level precedence: `-v` flags, then `RUST_LOG`, then `[app] log_level`.
//! HTTP client and server internals are held at `warn` unless `RUST_LOG`
//! says otherwise.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use crate::error::AppError;

/// Targets that flood `debug` output during summary runs and page loads.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "h2=warn", "reqwest=warn", "tower=warn"];

/// Install the global subscriber, writing to stderr.
///
/// `from_cli` marks `level` as coming from `-v`, in which case `RUST_LOG`
/// is ignored.
pub fn init(level: &str, from_cli: bool) -> Result<(), AppError> {
    let rust_log = if from_cli { None } else { std::env::var("RUST_LOG").ok() };
    let filter = build_filter(level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, AppError> {
    if let Some(spec) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return EnvFilter::try_new(spec).map_err(|e| AppError::Logger(format!("RUST_LOG '{spec}': {e}")));
    }

    parse_level(level)?;
    let base = EnvFilter::try_new(level).map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?;
    QUIET_TARGETS.iter().try_fold(base, |filter, target| {
        let directive = target
            .parse::<Directive>()
            .map_err(|e| AppError::Logger(format!("directive '{target}': {e}")))?;
        Ok(filter.add_directive(directive))
    })
}

/// A bare level name (`error` … `trace`, or `off`). Directive syntax such
/// as `product_recommender=debug` belongs in `RUST_LOG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}

/// `-v` count to level name; zero leaves the decision to env and config.
pub fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}
