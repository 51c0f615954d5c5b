//! PDC commands issued by the port task
use pdc_interface::{
    Rdo,
    ucsi::{ConnectorReset, Pdr, Uor},
};

/// Command sent to the PDC
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// No command
    #[default]
    None,
    Reset,
    GetInfo,
    ConnectorReset,
    GetCapability,
    GetConnectorCapability,
    SetCcom,
    SetUor,
    SetPdr,
    SetSinkPath,
    GetConnectorStatus,
    GetErrorStatus,
    GetVbusVoltage,
    GetPdos,
    GetRdo,
    SetRdo,
    ReadPowerLevel,
    GetCableProperty,
    GetVdo,
    GetIdentityDiscovery,
    SetPowerLevel,
}

impl Command {
    /// Name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Command::None => "NONE",
            Command::Reset => "RESET",
            Command::GetInfo => "GET_INFO",
            Command::ConnectorReset => "CONNECTOR_RESET",
            Command::GetCapability => "GET_CAPABILITY",
            Command::GetConnectorCapability => "GET_CONNECTOR_CAPABILITY",
            Command::SetCcom => "SET_CCOM",
            Command::SetUor => "SET_UOR",
            Command::SetPdr => "SET_PDR",
            Command::SetSinkPath => "SET_SINK_PATH",
            Command::GetConnectorStatus => "GET_CONNECTOR_STATUS",
            Command::GetErrorStatus => "GET_ERROR_STATUS",
            Command::GetVbusVoltage => "GET_VBUS_VOLTAGE",
            Command::GetPdos => "GET_PDOS",
            Command::GetRdo => "GET_RDO",
            Command::SetRdo => "SET_RDO",
            Command::ReadPowerLevel => "READ_POWER_LEVEL",
            Command::GetCableProperty => "GET_CABLE_PROPERTY",
            Command::GetVdo => "GET_VDO",
            Command::GetIdentityDiscovery => "GET_IDENTITY_DISCOVERY",
            Command::SetPowerLevel => "SET_POWER_LEVEL",
        }
    }

    /// Commands that do not need a port partner
    pub fn is_connectionless(self) -> bool {
        matches!(self, Command::Reset | Command::GetInfo)
    }

    /// Role swap commands, these get a smaller resend bound
    pub fn is_role_swap(self) -> bool {
        matches!(self, Command::SetUor | Command::SetPdr)
    }
}

/// Slot for one command request
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandRequest {
    pub command: Command,
    /// Waiting to be sent or in flight
    pub pending: bool,
    /// Last attempt failed
    pub error: bool,
}

impl CommandRequest {
    pub(crate) fn queue(&mut self, command: Command) {
        self.command = command;
        self.pending = true;
        self.error = false;
    }
}

/// Command requested through the public API
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublicCommand {
    Reset,
    /// Read chip info, bypassing the driver cache
    GetInfo,
    ConnectorReset(ConnectorReset),
    GetVbusVoltage,
    SetUor(Uor),
    SetPdr(Pdr),
    /// Request a new contract from the source
    SetRdo(Rdo),
}

impl PublicCommand {
    /// PDC command sent for this request
    pub fn command(&self) -> Command {
        match self {
            PublicCommand::Reset => Command::Reset,
            PublicCommand::GetInfo => Command::GetInfo,
            PublicCommand::ConnectorReset(_) => Command::ConnectorReset,
            PublicCommand::GetVbusVoltage => Command::GetVbusVoltage,
            PublicCommand::SetUor(_) => Command::SetUor,
            PublicCommand::SetPdr(_) => Command::SetPdr,
            PublicCommand::SetRdo(_) => Command::SetRdo,
        }
    }
}
