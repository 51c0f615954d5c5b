#![no_std]
//! Shared service layer for the power delivery subsystem.
//!
//! Provides the raw mutex used across services, the logging macros and the
//! small synchronization and event traits that the services build on.

pub mod event;
mod fmt;
pub mod sync;

/// Raw mutex type shared by every service.
///
/// Port tasks, driver callbacks and public API callers can run in different
/// execution contexts, so all shared state is guarded by a critical section.
pub type GlobalRawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[doc(hidden)]
#[cfg(feature = "defmt")]
pub use defmt as _defmt;

#[doc(hidden)]
#[cfg(feature = "log")]
pub use log as _log;
