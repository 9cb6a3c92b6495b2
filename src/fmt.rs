//! Logging shim for the host-testable modules.
//!
//! With the `defmt` feature these forward to the `defmt` macros (RTT on
//! target). Host builds have no logger, so the arguments are only borrowed
//! to keep them "used"; unit tests additionally record the level and format
//! string of every line in `capture`.

#![allow(unused_macros)]

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( &$x, )*);
            #[cfg(all(test, not(feature = "defmt")))]
            crate::fmt::capture::record(crate::fmt::capture::Level::Debug, $s);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::info!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( &$x, )*);
            #[cfg(all(test, not(feature = "defmt")))]
            crate::fmt::capture::record(crate::fmt::capture::Level::Info, $s);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( &$x, )*);
            #[cfg(all(test, not(feature = "defmt")))]
            crate::fmt::capture::record(crate::fmt::capture::Level::Warn, $s);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::error!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( &$x, )*);
            #[cfg(all(test, not(feature = "defmt")))]
            crate::fmt::capture::record(crate::fmt::capture::Level::Error, $s);
        }
    };
}
