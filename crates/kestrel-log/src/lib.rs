//! Leveled logging for the `Kestrel` runtime core.
//!
//! The runtime core logs lock contract violations, table growth and
//! lifecycle events through this crate. It has no dependencies: a single
//! global [`Logger`] holds the active level in an atomic, and the macros
//! capture the calling module path and the current thread.
//!
//! # Example
//!
//! ```
//! use kestrel_log::{debug, info, warn, Level};
//!
//! kestrel_log::set_level(Level::Debug);
//!
//! info!("symbol table ready with {} buckets", 17);
//! debug!("quark {} -> {:?}", 1, "alpha");
//! warn!("stale confinement handle");
//! ```

use std::fmt::Arguments;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "KESTREL_LOG";

/// Severity of a log record.
///
/// Lower numeric values are more severe. `Off` disables every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Nothing is logged.
    Off = 0,
    /// Contract violations and unrecoverable failures.
    Error = 1,
    /// Recoverable misuse, such as a stale handle passed by a caller.
    Warn = 2,
    /// Lifecycle events (initialization, shutdown).
    Info = 3,
    /// Internal state changes (table growth, lock waits).
    Debug = 4,
    /// Per-operation tracing.
    Trace = 5,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Off => "",
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case tag printed in front of each record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Off,
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl std::fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case.
    ///
    /// ```
    /// use kestrel_log::Level;
    ///
    /// assert_eq!("debug".parse(), Ok(Level::Debug));
    /// assert_eq!("WARN".parse(), Ok(Level::Warn));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Level::Off),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// The process-wide logger.
///
/// Only the level is mutable; it is stored in an atomic so the enabled check
/// in every macro is a single relaxed load.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the most verbose level that will be written.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the active level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns true if a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, created at `Level::Warn` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the level of the global logger from a level name.
///
/// ```
/// kestrel_log::set_level_from_str("info").unwrap();
/// assert!(kestrel_log::set_level_from_str("shouty").is_err());
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Reads [`LOG_ENV`] and applies it to the global logger.
///
/// Returns the level that is active afterwards. A missing or malformed
/// variable leaves the current level untouched.
pub fn init_from_env() -> Level {
    if let Ok(value) = std::env::var(LOG_ENV) {
        match value.parse() {
            Ok(level) => set_level(level),
            Err(err) => {
                __log_with_target(Level::Warn, module_path!(), format_args!("{err}"));
            }
        }
    }
    get_logger().level()
}

/// Writes one record. Called by the macros after the enabled check.
#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    static RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");
    let color = level.color_code();
    let tag = level.as_str();

    // A failed write to stderr has nowhere else to go.
    let _ = writeln!(
        std::io::stderr().lock(),
        "{color}[{tag}]{RESET} [{thread_name}] {target}: {args}"
    );
}

/// Logs at an explicit level.
///
/// ```
/// use kestrel_log::{log, Level};
///
/// log!(level: Level::Info, "interned {} names", 3);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at `Level::Error`.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at `Level::Warn`.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at `Level::Info`.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at `Level::Debug`.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at `Level::Trace`.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Off < Level::Error);
        assert!(Level::Error < Level::Warn);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("error".parse(), Ok(Level::Error));
        assert_eq!(" Warning ".parse(), Ok(Level::Warn));
        assert_eq!("NONE".parse(), Ok(Level::Off));
        assert_eq!("trace".parse(), Ok(Level::Trace));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_round_trips_through_u8() {
        for level in [
            Level::Off,
            Level::Error,
            Level::Warn,
            Level::Info,
            Level::Debug,
            Level::Trace,
        ] {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn test_logger_filtering() {
        let logger = Logger::new(Level::Info);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Info));
        assert!(!logger.enabled(Level::Debug));

        logger.set_level(Level::Off);
        assert!(!logger.enabled(Level::Error));
        assert!(!logger.enabled(Level::Off));

        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
    }

    #[test]
    fn test_parse_error_message() {
        let err = "loud".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "invalid log level: loud");
    }

    #[test]
    fn test_macros_from_many_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::Builder::new()
                    .name(format!("log-{i}"))
                    .spawn(move || {
                        error!("thread {} error record", i);
                        trace!("thread {} trace record", i);
                    })
                    .unwrap()
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
