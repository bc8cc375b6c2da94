//! Structured logging setup using tracing
//!
//! Console output for operators plus an optional JSON file layer with rolling
//! files for later analysis.

use crate::config::LoggingConfig;
use crate::domain::{MeridianError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose debug output drowns the import logs
const NOISY_TARGETS: [&str; 3] = ["hyper=warn", "reqwest=warn", "rustls=warn"];

/// Holds the file writer's worker alive; dropping it flushes pending lines
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber
///
/// Console lines go to stderr, away from command output. When `local_enabled`
/// is set, every event is also written as JSON to a rolling `meridian.log`
/// under `local_path`. `RUST_LOG` replaces the filter built from `log_level`.
///
/// ```no_run
/// use meridian::config::LoggingConfig;
/// use meridian::logging::init_logging;
///
/// # fn main() -> meridian::domain::Result<()> {
/// let _guard = init_logging("debug", &LoggingConfig::default())?;
/// tracing::info!(platform = "clinical", "ready");
/// # Ok(())
/// # }
/// ```
pub fn init_logging(log_level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(parse_log_level(log_level)?);

    let mut layers = vec![tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter.clone())
        .boxed()];

    let file_guard = if config.local_enabled {
        std::fs::create_dir_all(&config.local_path).map_err(|e| {
            MeridianError::Configuration(format!(
                "cannot create log directory {}: {e}",
                config.local_path
            ))
        })?;
        let appender = RollingFileAppender::new(
            parse_rotation(&config.local_rotation),
            &config.local_path,
            "meridian.log",
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
        );
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| MeridianError::Configuration(format!("logger already installed: {e}")))?;

    tracing::debug!(
        file_logging = config.local_enabled,
        path = %config.local_path,
        rotation = %config.local_rotation,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = vec![format!("meridian={level}")];
        directives.extend(NOISY_TARGETS.iter().map(|t| t.to_string()));
        EnvFilter::new(directives.join(","))
    })
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    level.trim().parse::<Level>().map_err(|_| {
        MeridianError::Configuration(format!(
            "invalid log level '{level}', expected trace, debug, info, warn or error"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("trace", Level::TRACE)]
    #[test_case("Debug", Level::DEBUG)]
    #[test_case(" warn ", Level::WARN)]
    #[test_case("ERROR", Level::ERROR)]
    fn test_parse_log_level(input: &str, expected: Level) {
        assert_eq!(parse_log_level(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_invalid() {
        assert!(matches!(
            parse_log_level("verbose"),
            Err(MeridianError::Configuration(_))
        ));
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn test_unknown_rotation_falls_back_to_daily() {
        assert_eq!(parse_rotation("hourly"), Rotation::HOURLY);
        assert_eq!(parse_rotation("never"), Rotation::NEVER);
        assert_eq!(parse_rotation("weekly"), Rotation::DAILY);
    }
}
