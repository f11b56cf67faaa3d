//! Domain-aware logging macros.
//!
//! Each macro injects a `domain` field automatically so callers never need to
//! remember the string literal. The domain is one of `sys`, `conn`, `pipe`,
//! `res`, `conf`.
//!
//! # Usage
//!
//! ```ignore
//! ag_info!(sys, rules = 2, "rule table ready");
//! ag_warn!(pipe, rule = %id, error = %e, "sink post failed");
//! ag_debug!(conn, peer = %peer, "accepted connection");
//! ```
//!
//! The domain identifier is a bare identifier, not a string; the macro turns
//! it into a `&str` literal. The macros are exported so the runtime crate logs
//! with the same field layout.

/// Internal helper. Do not call directly; use `ag_error!` … `ag_trace!`.
#[doc(hidden)]
#[macro_export]
macro_rules! ag_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        ::tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

/// Log at ERROR level with an automatic `domain` field.
#[macro_export]
macro_rules! ag_error {
    ($domain:ident, $($rest:tt)*) => {
        $crate::ag_log!(error, $domain, $($rest)*)
    };
}

/// Log at WARN level with an automatic `domain` field.
#[macro_export]
macro_rules! ag_warn {
    ($domain:ident, $($rest:tt)*) => {
        $crate::ag_log!(warn, $domain, $($rest)*)
    };
}

/// Log at INFO level with an automatic `domain` field.
#[macro_export]
macro_rules! ag_info {
    ($domain:ident, $($rest:tt)*) => {
        $crate::ag_log!(info, $domain, $($rest)*)
    };
}

/// Log at DEBUG level with an automatic `domain` field.
#[macro_export]
macro_rules! ag_debug {
    ($domain:ident, $($rest:tt)*) => {
        $crate::ag_log!(debug, $domain, $($rest)*)
    };
}

/// Log at TRACE level with an automatic `domain` field.
#[macro_export]
macro_rules! ag_trace {
    ($domain:ident, $($rest:tt)*) => {
        $crate::ag_log!(trace, $domain, $($rest)*)
    };
}
