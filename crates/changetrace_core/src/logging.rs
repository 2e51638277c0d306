//! Log sink for the traceability core.
//!
//! Core components only emit through the `log` macros. Whether anything is
//! written is the host's call: `CoreConfig::logging` names a level and an
//! absolute directory, and `TraceabilityService` installs a rolling file
//! sink from it when it is constructed.
//!
//! Event lines read `event=<name> module=<module> status=<status>` followed
//! by ids and counts. Events in use:
//! - `service_init`, `artifact_register`, `link_add`, `link_remove`,
//!   `change_record`, `change_transition` (module `service`)
//! - `impact_compute` (module `impact`), `coverage_compute` (module
//!   `coverage`), `db_open` / `db_migrate` (module `db`)
//! - `logging_init` and `panic` (module `logging`)
//!
//! # Invariants
//! - One sink per process. Installing the same settings again is a no-op;
//!   different settings are rejected.
//! - Installation never panics.
//! - Change before/after values and artifact titles never reach a log line.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "changetrace";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 120;

static ACTIVE_SINK: OnceCell<ActiveSink> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveSink {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Minimum severity written to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `debug` in debug builds, `info` in release builds.
impl Default for LogLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

/// Where and how verbosely the core writes its log files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LogSettings {
    #[serde(default)]
    pub level: LogLevel,
    /// Absolute directory; created on install when missing.
    pub dir: PathBuf,
}

impl LogSettings {
    pub fn new(level: LogLevel, dir: impl Into<PathBuf>) -> Self {
        Self {
            level,
            dir: dir.into(),
        }
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        if self.dir.as_os_str().is_empty() || !self.dir.is_absolute() {
            return Err(LoggingError::RelativeDir(self.dir.clone()));
        }
        Ok(())
    }
}

/// Failure to install the log sink.
#[derive(Debug)]
pub enum LoggingError {
    /// Log directory is empty or not absolute.
    RelativeDir(PathBuf),
    CreateDir { dir: PathBuf, source: io::Error },
    Backend(FlexiLoggerError),
    /// A sink with other settings is already installed in this process.
    Conflict {
        active: LogSettings,
        requested: LogSettings,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "log backend failed to start: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already writes `{}` at `{}`; refusing `{}` at `{}`",
                active.level.as_str(),
                active.dir.display(),
                requested.level.as_str(),
                requested.dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Installs the process-wide file sink described by `settings`.
///
/// # Errors
/// - `RelativeDir` for an empty or relative directory.
/// - `CreateDir` / `Backend` when the sink cannot start.
/// - `Conflict` when a sink with different settings is already active.
pub fn init_logging(settings: &LogSettings) -> Result<(), LoggingError> {
    settings.validate()?;
    let active = ACTIVE_SINK.get_or_try_init(|| start_sink(settings))?;
    if active.settings != *settings {
        return Err(LoggingError::Conflict {
            active: active.settings.clone(),
            requested: settings.clone(),
        });
    }
    Ok(())
}

/// Settings of the installed sink, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE_SINK.get().map(|active| active.settings.clone())
}

fn start_sink(settings: &LogSettings) -> Result<ActiveSink, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level.as_str())
        .map_err(LoggingError::Backend)?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={} dir={} version={}",
        settings.level.as_str(),
        settings.dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveSink {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map_or_else(
                || "unknown".to_string(),
                |at| format!("{}:{}", at.file(), at.line()),
            );
            error!(
                "event=panic module=logging status=error location={} summary={}",
                location,
                panic_summary(info.payload())
            );
            previous(info);
        }));
    });
}

// Panic text may quote record values; keep it to one short line.
fn panic_summary(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    single_line(text, PANIC_SUMMARY_CHARS)
}

fn single_line(text: &str, max_chars: usize) -> String {
    let mut line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max_chars)
        .collect();
    if text.chars().count() > max_chars {
        line.push_str("...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{panic_summary, single_line, LogLevel, LogSettings, LoggingError};

    #[test]
    fn level_names_and_alias() {
        let level: LogLevel = serde_json::from_str(r#""warning""#).unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), r#""warn""#);
        assert!(serde_json::from_str::<LogLevel>(r#""verbose""#).is_err());
    }

    #[test]
    fn settings_require_an_absolute_directory() {
        let relative = LogSettings::new(LogLevel::Info, "logs/dev");
        assert!(matches!(
            relative.validate(),
            Err(LoggingError::RelativeDir(_))
        ));
        assert!(LogSettings::new(LogLevel::Info, "").validate().is_err());

        let root = tempfile::tempdir().unwrap();
        LogSettings::new(LogLevel::Info, root.path())
            .validate()
            .unwrap();
    }

    #[test]
    fn panic_summary_is_one_capped_line() {
        let payload: Box<dyn std::any::Any + Send> =
            Box::new("REQ-1 before\nafter\rvalue".to_string());
        let summary = panic_summary(payload.as_ref());
        assert!(!summary.contains('\n') && !summary.contains('\r'));
        assert_eq!(single_line("abcdef", 3), "abc...");
        assert_eq!(single_line("abc", 3), "abc");
    }
}
