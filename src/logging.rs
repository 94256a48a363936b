//! Logging setup with journald support on Linux.
//!
//! Logs go to the systemd journal when one is reachable, otherwise to a
//! daily rolling file. Interactive runs can ask for stderr instead.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directive, e.g. `PHOTOLIB_LOG=debug`.
pub const LOG_ENV: &str = "PHOTOLIB_LOG";

/// Where log records are written.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Journald on Linux, else a rolling file in the default directory.
    #[default]
    System,
    /// Rolling file in this directory.
    Dir(PathBuf),
    Stderr,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. Call once at startup.
pub fn init(target: LogTarget) -> Result<()> {
    let log_dir = match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            return Ok(());
        }
        LogTarget::Dir(dir) => Some(dir),
        LogTarget::System => None,
    };

    #[cfg(target_os = "linux")]
    {
        if log_dir.is_none() {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald_layer)
                    .init();

                tracing::info!("Logging initialized with journald backend");
                return Ok(());
            }
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "photolib.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread; keep it for the process lifetime.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photolib")
        .join("logs")
}
