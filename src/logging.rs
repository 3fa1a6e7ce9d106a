//! Compile-time gated debug logging for the tick loop.

/// Emit per-handle tick traces only when the `sched_debug_logs` Cargo feature
/// is enabled.
///
/// With the feature enabled this forwards to `log::debug!`. With it disabled
/// (default), this macro compiles to a no-op while still type-checking format
/// arguments.
#[macro_export]
macro_rules! sched_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "sched_debug_logs")]
        {
            ::log::debug!($($arg)*);
        }
        #[cfg(not(feature = "sched_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
