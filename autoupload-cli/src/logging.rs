use anyhow::Result;
use std::env;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper_util=warn".parse().unwrap_or_else(|_| level.into()))
        .add_directive("reqwest=warn".parse().unwrap_or_else(|_| level.into()))
}

/// Logs to stderr and to `<dir>/<file_name>`. Keep the guard alive until exit
/// or the tail of the file log is lost.
pub fn init_logging(dir: &Path, file_name: &str) -> Result<WorkerGuard> {
    let level = log_level();

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Failed to create log directory {}: {e}", dir.display());
    }
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter(level)),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter(level)),
        )
        .try_init()?;

    Ok(guard)
}
