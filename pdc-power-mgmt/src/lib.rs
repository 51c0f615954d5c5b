#![no_std]
//! USB-C power delivery controller (PDC) power management
//!
//! One task per port drives a PDC through the [`pdc_interface::Pdc`] driver
//! trait. Each task owns an attach state machine and a send-command
//! sub-machine that issues exactly one command at a time, waits for its CCI
//! completion and retries within bounded budgets. Policy flags set from other
//! contexts are applied by the port task, and a cross-port arbitrator limits
//! how many ports may source 3 A at once. Callers use the blocking API on
//! [`service::Service`].
pub mod arbitrator;
pub mod cci;
pub mod command;
pub mod config;
pub mod platform;
pub mod policy;
pub mod port;
pub mod service;
pub mod task;

pub use config::{Config, PortConfig};
pub use platform::{DualRoleCapability, Platform};
pub use port::{PortRegistration, PortShared, State};
pub use service::Service;

/// Port number, also the index of the port in the registration list
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortId(pub u8);

impl PortId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors returned by the public API
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Port is not registered
    InvalidPort,
    /// More ports registered than the source current arbitrator can track
    TooManyPorts,
    /// A public command is already pending on this port
    Busy,
    /// Port is initializing or suspended
    NotReady,
    /// Command did not complete in time
    Timeout,
    /// Partner disconnected while a connection dependent command was pending
    Disconnected,
    /// PDC reported a failure
    Failed,
}
