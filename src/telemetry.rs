//! telemetry
//!
//! Structured logging setup.
//!
//! Logs go to stderr through a `tracing-subscriber` fmt layer. The filter is
//! chosen in this order (first match wins):
//!
//! 1. `$REGISTRAR_LOG` (any `EnvFilter` directive string)
//! 2. `[logging] filter` from the config file
//! 3. A level derived from the CLI verbosity flags

use tracing::metadata::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::core::config::LoggingConfig;
use crate::ui::output::Verbosity;

/// Environment variable holding a filter override.
pub const LOG_ENV: &str = "REGISTRAR_LOG";

fn level_from_verbosity(verbosity: Verbosity) -> LevelFilter {
    match verbosity {
        Verbosity::Quiet => LevelFilter::ERROR,
        Verbosity::Normal => LevelFilter::WARN,
        Verbosity::Debug => LevelFilter::DEBUG,
    }
}

/// Build the filter without installing anything.
pub fn build_filter(verbosity: Verbosity, logging: Option<&LoggingConfig>) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    // --debug beats a quieter configured filter.
    if verbosity != Verbosity::Debug {
        if let Some(filter) = logging
            .and_then(|l| l.filter.as_deref())
            .and_then(|f| EnvFilter::try_new(f).ok())
        {
            return filter;
        }
    }
    EnvFilter::default().add_directive(level_from_verbosity(verbosity).into())
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbosity: Verbosity, logging: Option<&LoggingConfig>) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(if verbosity == Verbosity::Debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let _ = Registry::default()
        .with(build_filter(verbosity, logging))
        .with(layer)
        .try_init();
}
