use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE_PREFIX: &str = "activity-center.log";

// Flushes the file writer when the process exits.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logs go to stderr, or to a daily rolling file under `log_dir`, filtered by
/// `RUST_LOG` (default `info`).
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    let installed = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let _ = FILE_GUARD.set(guard);
            builder.with_writer(writer).with_ansi(false).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| eyre!(e))
}
