//! Tracing setup

use crate::error::Result;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "stockpile.log";

/// Initialize logging to stderr, and to `<log_dir>/stockpile.log` when a
/// directory is given.
///
/// The returned guard must be held for the lifetime of the application so
/// file output is flushed.
pub fn init_logging(log_dir: Option<&Path>, default_filter: &str) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_writer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    Ok(guard)
}

/// Non-blocking writer appending to `<log_dir>/stockpile.log`, creating the
/// directory first.
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = rolling::never(log_dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(appender))
}
