use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::TMError;

const LOG_FILE: &str = "tabman.log";
const DEFAULT_FILTER: &str = "info";

pub fn logs_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

/// Installs the global subscriber. Logs go to a daily rolling file in `dir`,
/// the terminal is owned by the ui. `RUST_LOG` overrides the default level.
///
/// Keep the returned guard alive until exit, dropping it flushes the log.
pub fn init(dir: &Path) -> Result<WorkerGuard, TMError> {
    fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TMError::LoadingFailed(format!("logging: {e}")))?;
    Ok(guard)
}
