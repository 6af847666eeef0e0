//! Log output for binaries built on this crate.
//!
//! The library only emits `tracing` events; session tasks run inside a
//! `recommend_session` span carrying the session id. [`init_observability`]
//! decides where those events go, from `RECOMMEND_*` environment variables.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter used when neither `RECOMMEND_LOG_LEVEL` nor `RUST_LOG` is set:
/// session lifecycle from this crate, warnings from everything else.
pub const DEFAULT_LOG_FILTER: &str = "warn,recommend_stream=info";

const DEFAULT_LOG_FILE: &str = "recommend-stream.jsonl";

static INSTALLED: OnceCell<Option<LogSink>> = OnceCell::new();

/// Where session events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Compact lines on stdout.
    Console,
    /// JSON lines appended to a file, span fields included.
    JsonFile(PathBuf),
}

/// Logging choices resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    pub filter: String,
    pub sink: LogSink,
}

impl LogSettings {
    /// Reads:
    /// - `RECOMMEND_OBSERVABILITY_ENABLED` / `RECOMMEND_OBSERVABILITY`: on/off switch (default on).
    /// - `RECOMMEND_LOG_LEVEL`, then `RUST_LOG`: filter directives.
    /// - `RECOMMEND_JSON_LOG_PATH`: switches the sink to a JSON-lines file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["RECOMMEND_OBSERVABILITY_ENABLED", "RECOMMEND_OBSERVABILITY"]
            .into_iter()
            .find_map(|key| lookup(key))
            .map(|value| parse_switch(&value).unwrap_or(true))
            .unwrap_or(true);

        let filter = ["RECOMMEND_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_owned())
            .find(|value| !value.is_empty() && EnvFilter::try_new(value).is_ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());

        let sink = lookup("RECOMMEND_JSON_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(|path| LogSink::JsonFile(PathBuf::from(path.trim())))
            .unwrap_or(LogSink::Console);

        Self {
            enabled,
            filter,
            sink,
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Splits a log file path into the directory and file name the appender
/// expects.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_owned();
    (dir, file)
}

/// Installs the process-wide subscriber from [`LogSettings::from_env`].
///
/// Only the first call has an effect. Returns the sink in use, or `None`
/// when logging is switched off or another subscriber was already set.
pub fn init_observability() -> Option<&'static LogSink> {
    INSTALLED
        .get_or_init(|| install(LogSettings::from_env()))
        .as_ref()
}

fn install(settings: LogSettings) -> Option<LogSink> {
    if !settings.enabled {
        return None;
    }
    let filter = EnvFilter::try_new(&settings.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let installed = match &settings.sink {
        LogSink::Console => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        LogSink::JsonFile(path) => {
            let (dir, file) = split_log_path(path);
            if std::fs::create_dir_all(&dir).is_err() {
                return None;
            }
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_writer(tracing_appender::rolling::never(dir, file)),
                )
                .try_init()
        }
    };
    installed.ok().map(|()| settings.sink)
}
