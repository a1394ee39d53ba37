use std::fmt;
use std::panic::{self, Location, PanicHookInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::logging;

const TARGET: &str = "observability";

/// The last fatal condition seen by the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// Subsystem or function that gave up, e.g. `"apply_impulse"` or `"panic"`.
    pub context: String,
    pub message: String,
    /// `file:line` of the caller, when known.
    pub location: Option<String>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

static VIOLATIONS: AtomicU64 = AtomicU64::new(0);

fn failure_slot() -> MutexGuard<'static, Option<Failure>> {
    static SLOT: OnceLock<Mutex<Option<Failure>>> = OnceLock::new();
    let slot = SLOT.get_or_init(|| Mutex::new(None));
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record(failure: Failure) {
    logging::error(TARGET, failure.to_string());
    *failure_slot() = Some(failure);
}

pub fn clear_sticky_error() {
    *failure_slot() = None;
}

pub fn last_failure() -> Option<Failure> {
    failure_slot().clone()
}

pub fn sticky_error() -> Option<String> {
    last_failure().map(|failure| failure.to_string())
}

/// Number of invariant violations raised since process start.
pub fn violation_count() -> u64 {
    VIOLATIONS.load(Ordering::Relaxed)
}

/// Reports a broken caller/setup invariant and panics.
#[track_caller]
pub fn invariant_violation(context: &str, message: impl AsRef<str>) -> ! {
    let location = Location::caller();
    VIOLATIONS.fetch_add(1, Ordering::Relaxed);
    record(Failure {
        context: context.to_string(),
        message: message.as_ref().to_string(),
        location: Some(format!("{}:{}", location.file(), location.line())),
    });
    panic!("invariant violated in {}: {}", context, message.as_ref());
}

/// Chains onto the current hook so panics outside `invariant_violation`
/// still land in the sticky slot. Idempotent.
pub fn install_panic_hook() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    if INSTALLED.set(()).is_err() {
        return;
    }
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let text = panic_text(info);
        let already_recorded = last_failure().is_some_and(|failure| {
            failure.context != "panic" && text.contains(&failure.message)
        });
        if !already_recorded {
            record(Failure {
                context: "panic".to_string(),
                message: text,
                location: info
                    .location()
                    .map(|loc| format!("{}:{}", loc.file(), loc.line())),
            });
        }
        previous(info);
    }));
}

fn panic_text(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violation_panics_and_records_failure() {
        let before = violation_count();
        let result = panic::catch_unwind(|| invariant_violation("tests", "mass must be > 0"));
        assert!(result.is_err());
        assert!(violation_count() > before);
        let failure = last_failure().expect("failure recorded");
        assert_eq!(failure.context, "tests");
        assert_eq!(failure.message, "mass must be > 0");
        assert!(failure
            .location
            .as_deref()
            .is_some_and(|loc| loc.contains("observability.rs")));
        assert!(sticky_error()
            .unwrap_or_default()
            .starts_with("tests: mass must be > 0"));
        clear_sticky_error();
    }

    #[test]
    fn failure_display_includes_location() {
        let failure = Failure {
            context: "probe".to_string(),
            message: "ray direction must be non-zero".to_string(),
            location: Some("probe.rs:12".to_string()),
        };
        assert_eq!(
            failure.to_string(),
            "probe: ray direction must be non-zero (probe.rs:12)"
        );
    }
}
