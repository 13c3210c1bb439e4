use std::{env, path::Path};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{Builder, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting `pretty` (default) or `json` output.
pub const LOG_FORMAT_ENV: &str = "REGISTRY_CONFIG_LOG_FORMAT";

const DAYS_TO_KEEP: usize = 7;

/// Console output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human readable output with thread names.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Reads [`LOG_FORMAT_ENV`]; anything but `json` means pretty.
    pub fn from_env() -> Self {
        match env::var(LOG_FORMAT_ENV) {
            Ok(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing for the application
///
/// Uses RUST_LOG if set, otherwise "info". Output style comes from
/// [`LOG_FORMAT_ENV`]. Logs go to stderr so command output on stdout stays
/// clean.
///
/// # Errors
/// Returns error if tracing subscriber initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry().with(env_filter());

    match LogFormat::from_env() {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_level(true)
                        .with_thread_names(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Initialize tracing with file output
///
/// Like [`init`], plus a daily rolling file in `log_dir` keeping a week of
/// history. The returned guard flushes the file writer when dropped; hold
/// it for the life of the program.
///
/// # Errors
/// Returns error if file creation or tracing subscriber initialization fails
pub fn init_with_file(log_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file_appender = Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(DAYS_TO_KEEP)
        .filename_prefix("registry-config")
        .filename_suffix("log")
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry().with(env_filter());

    match LogFormat::from_env() {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .try_init()?;
        }
        LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_names(true)
                        .with_writer(std::io::stderr),
                )
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(true)
                        .with_thread_names(true)
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .try_init()?;
        }
    }

    Ok(guard)
}
