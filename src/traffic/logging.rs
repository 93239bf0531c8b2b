use std::io;
use std::path::Path;

use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, registry};

use crate::traffic::config::{Config, Logging};

// Helper struct to store the logger guards. When they are dropped, logging is
// reset.
#[allow(dead_code)]
pub struct LogGuards {
    log_guard: Option<WorkerGuard>,
    default: DefaultGuard,
}

pub fn init_std_out_logging() -> DefaultGuard {
    let collector = registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO),
    );
    tracing::subscriber::set_default(collector)
}

/// Console logging plus an optional non-blocking JSON log file in `dir`,
/// depending on the configured level.
pub fn init_logging(config: &Config, dir: &Path) -> LogGuards {
    let (log_layer, log_guard) = if config.logging != Logging::Off {
        let log_file_appender = rolling::never(dir, "traffic_log.txt");
        let (log_file, log_guard) = non_blocking(log_file_appender);
        let layer = fmt::Layer::new()
            .with_writer(log_file)
            .json()
            .with_ansi(false)
            .with_filter(config.logging.level_filter());
        (Some(layer), Some(log_guard))
    } else {
        (None, None)
    };

    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(config.logging.level_filter());

    // An Option layer is a no-op layer when None.
    let collector = registry().with(log_layer).with(console_layer);
    let default = tracing::subscriber::set_default(collector);

    LogGuards { log_guard, default }
}
