//! Utilities for working with panic payloads.
//!
//! Transaction, indicator and error callbacks run on the receiver task. A
//! panicking callback is caught here, logged, and counted so the receiver
//! keeps dispatching.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
///
/// ```
/// use mbimlink::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(
///     format_panic(Box::new(String::from("boom"))).to_string(),
///     "boom"
/// );
/// assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

/// Run a user callback, containing any panic it raises.
///
/// Returns `false` if the callback panicked. The panic is logged with
/// `callback` naming the kind of callback that failed.
pub(crate) fn run_callback(callback: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::warn!(
                callback,
                panic = %format_panic(payload),
                "callback panicked; continuing"
            );
            crate::metrics::inc_callback_panics(callback);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tracing_test::traced_test;

    use super::run_callback;

    #[test]
    fn completed_callback_reports_success() {
        let ran = AtomicBool::new(false);
        assert!(run_callback("transaction", || ran.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    #[traced_test]
    fn panicking_callback_is_contained_and_logged() {
        assert!(!run_callback("indicator", || panic!("subscriber failed")));
        assert!(logs_contain("callback panicked"));
        assert!(logs_contain("subscriber failed"));
    }
}
