//! Logging shims: forward to `log` or `defmt` when enabled, vanish otherwise.
#![allow(unused_macros)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        #[cfg(feature = "log")]
        ::log::trace!($s $(, $x)*);
        #[cfg(feature = "defmt-03")]
        ::defmt::trace!($s $(, $x)*);
        #[cfg(not(any(feature = "log", feature = "defmt-03")))]
        let _ = ($( & $x ),*);
    };
}

pub(crate) use trace;

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        #[cfg(feature = "log")]
        ::log::debug!($s $(, $x)*);
        #[cfg(feature = "defmt-03")]
        ::defmt::debug!($s $(, $x)*);
        #[cfg(not(any(feature = "log", feature = "defmt-03")))]
        let _ = ($( & $x ),*);
    };
}

pub(crate) use debug;

macro_rules! warn_impl {
    ($s:literal $(, $x:expr)* $(,)?) => {
        #[cfg(feature = "log")]
        ::log::warn!($s $(, $x)*);
        #[cfg(feature = "defmt-03")]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(not(any(feature = "log", feature = "defmt-03")))]
        let _ = ($( & $x ),*);
    };
}

pub(crate) use warn_impl as warn;
