//! Logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! The poll loop and the session orchestrator log every attempt and every
//! phase change. That is useful while debugging a backend but noisy in normal
//! use, so each chatty module owns a switch:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("poll attempt {} for job {}", attempt, job_id);
//! ```
//!
//! The macros are exported at the crate root and forward to the `log` facade,
//! so `RUST_LOG` filtering still applies on top of the flag.

/// Info-level log, emitted only when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Debug-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
