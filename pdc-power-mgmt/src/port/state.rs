//! Port task states
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Port task state, as reported to callers
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    /// Waiting for the PDC to come up
    Init,
    Unattached,
    /// PD contract as a sink
    SnkAttached,
    /// PD contract as a source
    SrcAttached,
    /// Type-C only sink
    SnkTypecOnly,
    /// Type-C only source
    SrcTypecOnly,
    /// Starting a command
    SendCmdStart,
    /// Waiting for a command to complete
    SendCmdWait,
    /// PDC communication suspended
    Suspended,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Init => "Init",
            State::Unattached => "Unattached",
            State::SnkAttached => "Attached.SNK",
            State::SrcAttached => "Attached.SRC",
            State::SnkTypecOnly => "TypeCSnkAttached",
            State::SrcTypecOnly => "TypeCSrcAttached",
            State::SendCmdStart => "SendCmdStart",
            State::SendCmdWait => "SendCmdWait",
            State::Suspended => "Suspended",
        }
    }

    /// A partner is attached
    pub fn is_attached(self) -> bool {
        matches!(
            self,
            State::SnkAttached | State::SrcAttached | State::SnkTypecOnly | State::SrcTypecOnly
        )
    }
}

/// Setup sequence after a PD sink attach
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum SinkStep {
    #[default]
    GetConnectorCapability,
    GetCableProperty,
    SetUor,
    SetPdr,
    IdentityDiscovery,
    GetVdo,
    ReadPowerLevel,
    GetSourcePdos,
    GetRdo,
    GetSinkPdos,
    Evaluate,
    EnableSinkPath,
    StartCharging,
    Run,
}

/// Setup sequence after a PD source attach
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum SourceStep {
    #[default]
    GetConnectorCapability,
    GetCableProperty,
    SetUor,
    SetPdr,
    IdentityDiscovery,
    GetVdo,
    GetSinkPdos,
    Evaluate,
    Run,
}

/// Setup sequence after a Type-C only attach, either direction
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TypecStep {
    #[default]
    GetConnectorCapability,
    Evaluate,
    EnableSinkPath,
    StartCharging,
    Run,
}

/// Bring-up sequence
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum InitStep {
    #[default]
    WaitReady,
    GetInfo,
    GetCapability,
    GetConnectorStatus,
}
