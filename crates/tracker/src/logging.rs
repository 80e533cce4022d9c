//! Console logging plus optional rolling JSON log files.
//!
//! - `TRACKER_FILE_LOGGING`: "true" or "1" enables file output
//! - `TRACKER_LOG_DIR`: log directory (default `./logs`)
//! - `TRACKER_LOG_MAX_FILES`: daily files to retain (default 7)

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "pallyops-tracker.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub max_files: usize,
}

impl FileLoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("TRACKER_FILE_LOGGING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let log_dir = lookup("TRACKER_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"));

        let max_files = lookup("TRACKER_LOG_MAX_FILES")
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(7);

        Self {
            enabled,
            log_dir,
            max_files,
        }
    }
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(log_level: &str) -> String {
    format!("warn,tracker={log_level},pallyops_tracker={log_level},tower_http={log_level}")
}

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Hold the returned guard until shutdown so
/// buffered file output is flushed.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::from_env();
    let console_layer = tracing_subscriber::fmt::layer().with_filter(build_filter(log_level));

    if !config.enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", config.log_dir, e);
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(build_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = ?config.log_dir,
        max_files = config.max_files,
        "File logging enabled"
    );

    let log_dir = config.log_dir.clone();
    let max_files = config.max_files;
    std::thread::spawn(move || cleanup_old_logs(&log_dir, max_files));

    Some(guard)
}

/// Delete all but the newest `max_files` log files in `log_dir`.
pub fn cleanup_old_logs(log_dir: &Path, max_files: usize) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((e.path(), modified))
        })
        .collect();

    if log_files.len() <= max_files {
        return;
    }

    log_files.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            eprintln!("Failed to remove old log file {path:?}: {e}");
        }
    }
}
