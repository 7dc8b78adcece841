//! Tracing setup: stderr plus a daily-rolling `footy.log` in the data directory.
//!
//! `RUST_LOG` overrides the default `info` filter.

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "footy.log";
const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub dir: PathBuf,
    /// Mirror log lines to stderr. Off for the terminal dashboard.
    pub console: bool,
}

/// Install the global subscriber. Keep the returned guard alive until exit so the
/// file writer flushes. A second call is a no-op apart from the returned guard.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(&settings.dir) {
        eprintln!("failed to create log directory {}: {e}", settings.dir.display());
    }

    let file_appender = tracing_appender::rolling::daily(&settings.dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter());

    let console_layer = settings.console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .compact()
            .with_filter(filter())
    });

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
