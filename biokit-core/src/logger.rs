use std::sync::{Arc, OnceLock};

/// Receives log messages produced by `BioKit`.
///
/// Implemented by the host app and exported via `UniFFI`, so handshake diagnostics end up in the
/// app's own logging pipeline instead of stdout.
///
/// # Examples
///
/// ```rust
/// use biokit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object BioKitLogcat : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toPriority(), "BioKit", message)
///     }
/// }
///
/// setLogger(BioKitLogcat) // once, in Application.onCreate
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log message.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of the handshake.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failed steps.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// Bridges the `log` facade to the foreign [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace output is only forwarded for records coming from `biokit` modules;
/// dependencies such as `reqwest` or `rustls` are too chatty at those levels.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_debug_or_trace = matches!(level, log::Level::Debug | log::Level::Trace);
    let from_biokit = module_path.is_some_and(|path| path.starts_with("biokit"));
    !is_debug_or_trace || from_biokit
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Call once, early in the app lifecycle. Subsequent calls are ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(log::Level::Error, Some("reqwest::connect") => true; "errors from deps")]
    #[test_case(log::Level::Info, None => true; "info without module")]
    #[test_case(log::Level::Debug, Some("biokit_core::handshake") => true; "debug from biokit")]
    #[test_case(log::Level::Debug, Some("hyper::proto") => false; "debug from deps")]
    #[test_case(log::Level::Trace, None => false; "trace without module")]
    fn test_should_forward(level: log::Level, module_path: Option<&str>) -> bool {
        should_forward(level, module_path)
    }
}
