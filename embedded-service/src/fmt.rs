//! Logging macros
//!
//! Forward to `defmt` or `log` depending on the enabled feature. With neither
//! feature enabled the arguments are still type-checked but nothing is emitted.

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

/// Log at `trace` level
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::_defmt::trace!($($arg)*)
    };
}

/// Log at `trace` level
#[cfg(feature = "log")]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::_log::trace!($($arg)*)
    };
}

/// Log at `trace` level
#[cfg(not(any(feature = "defmt", feature = "log")))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Log at `debug` level
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::_defmt::debug!($($arg)*)
    };
}

/// Log at `debug` level
#[cfg(feature = "log")]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::_log::debug!($($arg)*)
    };
}

/// Log at `debug` level
#[cfg(not(any(feature = "defmt", feature = "log")))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Log at `info` level
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::_defmt::info!($($arg)*)
    };
}

/// Log at `info` level
#[cfg(feature = "log")]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::_log::info!($($arg)*)
    };
}

/// Log at `info` level
#[cfg(not(any(feature = "defmt", feature = "log")))]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Log at `warn` level
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::_defmt::warn!($($arg)*)
    };
}

/// Log at `warn` level
#[cfg(feature = "log")]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::_log::warn!($($arg)*)
    };
}

/// Log at `warn` level
#[cfg(not(any(feature = "defmt", feature = "log")))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Log at `error` level
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::_defmt::error!($($arg)*)
    };
}

/// Log at `error` level
#[cfg(feature = "log")]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::_log::error!($($arg)*)
    };
}

/// Log at `error` level
#[cfg(not(any(feature = "defmt", feature = "log")))]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}
