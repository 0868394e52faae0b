use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turns internal debug output on or off.
///
/// This is flipped by the client when `ClientOptions::debug` is set, so that
/// the macro below does not need to chase down the bound client on every call.
pub(crate) fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

#[cfg(not(feature = "debug-logs"))]
pub(crate) fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Internal debug logging.
///
/// Writes to stderr when debug mode is enabled on the client options.  When
/// the `debug-logs` feature is enabled this logs through the `log` crate
/// under the `streply` target instead.
macro_rules! streply_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug-logs")]
        {
            ::log::debug!(target: "streply", $($arg)*);
        }
        #[cfg(not(feature = "debug-logs"))]
        {
            if crate::macros::debug_enabled() {
                eprint!("[streply] ");
                eprintln!($($arg)*);
            }
        }
    }};
}
