//! Tracing setup.
//!
//! The console layer goes to stderr and defaults to `warn` (overridable
//! with `RUST_LOG`) so it stays out of the way of menus and progress bars.
//! With logging enabled in settings, a second layer writes everything from
//! this crate at `debug` to `log-%m-%d-%Y-%H-%M.txt` in the log directory.
//!
//! Whether the file layer exists depends on the settings file, so anything
//! logged while loading config and settings goes through [`bootstrap`],
//! which routes it to the console alone.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing_appender::non_blocking::WorkerGuard;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the background log writer alive. Drop it last.
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter)
}

/// Run `f` with a console-only subscriber active on this thread.
pub fn bootstrap<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::registry().with(console_layer());
    tracing::subscriber::with_default(subscriber, f)
}

pub fn log_file_name(now: DateTime<Local>) -> String {
    now.format("log-%m-%d-%Y-%H-%M.txt").to_string()
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init(file_logging: bool, log_dir: &Path) -> Result<LogGuard> {
    let mut dir_error = None;
    let (file_layer, worker, file) = if file_logging {
        match std::fs::create_dir_all(log_dir) {
            Ok(()) => {
                let name = log_file_name(Local::now());
                let appender = tracing_appender::rolling::never(log_dir, &name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new("netdiag=debug"));
                (Some(layer), Some(guard), Some(log_dir.join(name)))
            }
            Err(e) => {
                dir_error = Some(e);
                (None, None, None)
            }
        }
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(e) = dir_error {
        tracing::warn!(dir = %log_dir.display(), error = %e, "cannot create log directory, file logging disabled");
    }
    if let Some(path) = &file {
        tracing::info!(path = %path.display(), "session log opened");
    }

    Ok(LogGuard { _worker: worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_format() {
        let t = Local.with_ymd_and_hms(2023, 11, 4, 9, 7, 59).unwrap();
        assert_eq!(log_file_name(t), "log-11-04-2023-09-07.txt");
    }

    #[test]
    fn test_bootstrap_returns_closure_value() {
        let value = bootstrap(|| {
            tracing::warn!("logged before the global subscriber exists");
            42
        });
        assert_eq!(value, 42);
    }
}
