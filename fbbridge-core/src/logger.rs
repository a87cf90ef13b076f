use std::sync::{Arc, OnceLock};

/// Receives log records emitted by the bridge.
///
/// The bridge logs through the `log` facade. Hosts that do not install their
/// own `log` implementation can hand a [`Logger`] to [`set_logger`] instead.
///
/// # Examples
///
/// ```rust
/// use fbbridge_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, target: &str, message: String) {
///         eprintln!("[{level:?}] {target}: {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified level.
    ///
    /// `target` is the module path of the record (for example
    /// `fbbridge_core::status`).
    fn log(&self, level: LogLevel, target: &str, message: String);
}

/// Severity of a forwarded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Very detailed diagnostics, such as every status vector element.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress information (library loaded, attach succeeded).
    Info,
    /// Recoverable problems (ignored configuration, cleanup failures).
    Warn,
    /// Failures that could not be handled.
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

/// Returns `true` if a record should reach the host logger.
///
/// Debug and trace records from other crates are dropped; only the bridge's
/// own chatter is forwarded at those levels.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let from_bridge = module_path.is_some_and(|path| path.starts_with("fbbridge"));
    let verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    from_bridge || !verbose
}

/// `log::Log` implementation forwarding to the host [`Logger`].
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
            logger.log(
                record.level().into(),
                record.target(),
                format!("{}", record.args()),
            );
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host logger.
///
/// Only the first call has an effect; later calls are reported on stderr and
/// ignored. If another `log` implementation is already installed the host
/// logger is stored but never receives records.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
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
