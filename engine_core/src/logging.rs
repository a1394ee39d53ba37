use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
            LogLevel::Trace => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", label)
    }
}

type Logger = Box<dyn Fn(LogLevel, &str, &str) + Send + Sync + 'static>;

static MAX_LEVEL: AtomicU8 = AtomicU8::new(2);

fn default_logger(level: LogLevel, target: &str, message: &str) {
    eprintln!("[{}] {}: {}", level, target, message);
}

fn logger_cell() -> &'static Mutex<Logger> {
    static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();
    LOGGER.get_or_init(|| Mutex::new(Box::new(default_logger)))
}

fn lock_logger() -> std::sync::MutexGuard<'static, Logger> {
    match logger_cell().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn set_logger(logger: impl Fn(LogLevel, &str, &str) + Send + Sync + 'static) {
    let mut guard = lock_logger();
    *guard = Box::new(logger);
}

pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level.as_u8(), Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    match MAX_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        3 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

/// Cheap check for hot paths; format the message only when this is true.
pub fn enabled(level: LogLevel) -> bool {
    level.as_u8() <= MAX_LEVEL.load(Ordering::Relaxed)
}

pub fn log(level: LogLevel, target: &str, message: impl AsRef<str>) {
    if !enabled(level) {
        return;
    }
    let guard = lock_logger();
    (guard)(level, target, message.as_ref());
}

pub fn error(target: &str, message: impl AsRef<str>) {
    log(LogLevel::Error, target, message);
}

pub fn warn(target: &str, message: impl AsRef<str>) {
    log(LogLevel::Warn, target, message);
}

pub fn info(target: &str, message: impl AsRef<str>) {
    log(LogLevel::Info, target, message);
}

pub fn debug(target: &str, message: impl AsRef<str>) {
    log(LogLevel::Debug, target, message);
}

pub fn trace(target: &str, message: impl AsRef<str>) {
    log(LogLevel::Trace, target, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
        assert_eq!(LogLevel::Info.to_string(), "info");
    }

    #[test]
    fn custom_sink_sees_filtered_records() {
        use std::sync::Arc;

        let records: Arc<Mutex<Vec<(LogLevel, String)>>> = Arc::default();
        let sink = Arc::clone(&records);
        set_logger(move |level, target, message| {
            if target == "sink-test" {
                if let Ok(mut records) = sink.lock() {
                    records.push((level, message.to_string()));
                }
            }
        });
        set_max_level(LogLevel::Debug);
        assert_eq!(max_level(), LogLevel::Debug);
        assert!(enabled(LogLevel::Debug));
        assert!(!enabled(LogLevel::Trace));

        debug("sink-test", "kept");
        trace("sink-test", "dropped");

        set_max_level(LogLevel::Info);
        set_logger(default_logger);
        let records = records.lock().expect("records");
        assert_eq!(records.as_slice(), &[(LogLevel::Debug, "kept".to_string())]);
    }
}
