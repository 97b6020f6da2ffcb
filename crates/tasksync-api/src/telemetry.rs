//! Tracing subscriber setup for the server binary.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `LOG_FORMAT` | `text` (default) or `json` |
//! | `LOG_FILE` | write to this file, rotated daily, instead of stdout |
//! | `LOG_ANSI` | `true`/`1` or anything else; unset means auto (off for files) |
//! | `RUST_LOG` | env filter, default [`DEFAULT_LOG_FILTER`] |

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "tasksync_api=debug,tasksync_core=info,tower_http=debug";

const DEFAULT_LOG_FILE_NAME: &str = "tasksync-api.log";

/// Output settings for [`init_tracing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub json: bool,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            json: lookup("LOG_FORMAT").is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            file: lookup("LOG_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }

    /// Human-readable destination for the startup log line.
    pub fn destination(&self) -> String {
        self.file
            .as_deref()
            .map_or_else(|| "(stdout)".to_string(), |p| p.display().to_string())
    }
}

/// Split a log path into the rotation directory and file-name prefix.
fn rotation_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_LOG_FILE_NAME)
        .to_string();
    (dir, name)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file; dropping it flushes and stops the background writer.
pub fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (writer, guard) = match settings.file.as_deref() {
        Some(path) => {
            let (dir, name) = rotation_target(path);
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // Exactly one of the four output layers is present.
    let to_stdout = writer.is_none();
    let stdout_text = (to_stdout && !settings.json).then(|| {
        let layer = fmt::layer();
        match settings.ansi {
            Some(ansi) => layer.with_ansi(ansi),
            None => layer,
        }
    });
    let stdout_json = (to_stdout && settings.json).then(|| fmt::layer().json());
    let file_text = writer.clone().filter(|_| !settings.json).map(|w| {
        fmt::layer()
            .with_writer(w)
            .with_ansi(settings.ansi.unwrap_or(false))
    });
    let file_json = writer
        .filter(|_| settings.json)
        .map(|w| fmt::layer().json().with_writer(w));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_text)
        .with(stdout_json)
        .with(file_text)
        .with(file_json)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        LogSettings::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_to_text_on_stdout() {
        let s = settings(&[]);
        assert_eq!(s, LogSettings::default());
        assert_eq!(s.destination(), "(stdout)");
    }

    #[test]
    fn test_json_file_with_ansi() {
        let s = settings(&[
            ("LOG_FORMAT", "JSON"),
            ("LOG_FILE", "/var/log/tasksync/api.log"),
            ("LOG_ANSI", "1"),
        ]);
        assert!(s.json);
        assert_eq!(s.file, Some(PathBuf::from("/var/log/tasksync/api.log")));
        assert_eq!(s.ansi, Some(true));
        assert_eq!(s.destination(), "/var/log/tasksync/api.log");
    }

    #[test]
    fn test_blank_log_file_means_stdout() {
        let s = settings(&[("LOG_FILE", " "), ("LOG_ANSI", "no")]);
        assert_eq!(s.file, None);
        assert_eq!(s.ansi, Some(false));
    }

    #[test]
    fn test_rotation_target() {
        assert_eq!(
            rotation_target(Path::new("/var/log/api.log")),
            (PathBuf::from("/var/log"), "api.log".to_string())
        );
        assert_eq!(
            rotation_target(Path::new("api.log")),
            (PathBuf::from("."), "api.log".to_string())
        );
    }
}
