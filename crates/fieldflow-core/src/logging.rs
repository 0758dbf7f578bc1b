#![forbid(unsafe_code)]

//! Feature-gated log macros for the state manager and event bus.
//!
//! `crate::trace!`, `crate::debug!`, `crate::warn!` and `crate::error!` are
//! the `tracing` macros when the `tracing` feature is on. With it off they
//! expand to nothing, so the core crate logs without depending on a
//! subscriber. Arguments of a disabled macro are not evaluated; a binding
//! used only for logging needs `let _ = binding;` under
//! `#[cfg(not(feature = "tracing"))]`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, trace, warn};

#[cfg(not(feature = "tracing"))]
mod disabled {
    /// Expands to nothing; `tracing` is off.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// Expands to nothing; `tracing` is off.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// Expands to nothing; `tracing` is off.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// Expands to nothing; `tracing` is off.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }
}
