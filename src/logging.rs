//! Logging setup for binaries and tests that embed tidyframe.
//!
//! The library itself only emits `tracing` events; nothing is printed unless the
//! host application installs a subscriber. Two entry points are provided:
//!
//! - [`init`]: console output only, filtered by `RUST_LOG` (default `info`).
//! - [`init_with_dir`]: console plus daily-rotated files, including a separate
//!   warn-and-above log so skipped steps and degenerate columns are easy to find.
//!
//! ```no_run
//! tidyframe::logging::init().expect("Failed to initialize logging");
//! tracing::info!("cleaning started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Rotated files kept per log family.
const KEPT_LOG_FILES: usize = 10;

/// Default log directory under the platform data dir
///
/// Returns:
/// - Windows: `%APPDATA%/tidyframe/logs`
/// - macOS: `~/Library/Application Support/tidyframe/logs`
/// - Linux: `~/.local/share/tidyframe/logs`
pub fn default_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("tidyframe").join("logs"))
}

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")
}

fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
}

fn file_layer<S>(writer: RollingFileAppender) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(writer)
}

fn daily_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Installs a console-only subscriber.
///
/// # Errors
///
/// Returns error if a global subscriber is already set.
pub fn init() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(console_layer())
        .try_init()
        .context("Failed to install tracing subscriber")
}

/// Installs console output plus rotating files in `log_dir`.
///
/// Creates two log families:
/// - `tidyframe.<date>.log`: everything that passes the env filter
/// - `error.<date>.log`: warnings and errors only
///
/// # Errors
///
/// Returns error if the directory cannot be created, an appender fails, or a
/// global subscriber is already set.
pub fn init_with_dir(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let all_logs = daily_appender(log_dir, "tidyframe")?;
    let warnings = daily_appender(log_dir, "error")?;

    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(console_layer())
        .with(file_layer(all_logs))
        .with(file_layer(warnings).with_filter(EnvFilter::new("warn")))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir() {
        if let Ok(log_dir) = default_log_dir() {
            assert!(
                log_dir.ends_with("tidyframe/logs") || log_dir.ends_with("tidyframe\\logs"),
                "unexpected log dir {}",
                log_dir.display()
            );
        }
    }

    #[test]
    fn test_appender_created_in_fresh_dir() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("tidyframe-logs-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        daily_appender(&dir, "scratch")?;
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
