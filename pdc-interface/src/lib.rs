#![no_std]
//! Interface between the PDC power management service and USB-C power delivery controller drivers
//!
//! Commands follow the UCSI model: a driver call only *starts* a command. The
//! outcome is reported later through the CCI word, after which the data of the
//! completed command is collected with [`Pdc::take_response`].
use heapless::Vec;

pub use embedded_usb_pd::PdError;

pub mod info;
pub mod pdo;
pub mod ucsi;

pub use info::{FwVersion, PdcInfo};
pub use pdo::{MAX_PDOS, Pdo, Rdo};
pub use ucsi::Cci;

use ucsi::{
    CableProperty, Ccom, ConnectorCapability, ConnectorReset, ConnectorStatus, DrpMode, ErrorStatus, PdoType, Pdr,
    TypeCCurrent, Uor,
};

/// Maximum number of VDOs returned by GET_VDO
pub const MAX_VDOS: usize = 6;

/// PPM capability returned by GET_CAPABILITY
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PpmCapability {
    /// bmAttributes
    pub attributes: u32,
    /// Number of connectors
    pub num_connectors: u8,
    /// BCD USB PD revision
    pub bcd_pd_version: u16,
}

/// Source of the VDOs requested with GET_VDO
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdoOrigin {
    /// Port partner
    Partner,
    /// Cable plug
    Cable,
}

/// State of discover identity with the port partner
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    /// Not started or still running
    #[default]
    NotStarted,
    /// Identity discovered
    Complete,
    /// Partner NAKed discover identity
    Nak,
    /// Discovery failed
    Failed,
}

/// Arguments of a GET_PDOS request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdoRequest {
    /// Sink or source capabilities
    pub pdo_type: PdoType,
    /// Index of the first PDO
    pub offset: u8,
    /// Number of PDOs
    pub count: u8,
    /// Read the partner's PDOs rather than our own
    pub partner: bool,
}

impl PdoRequest {
    /// All PDOs of the given type from the port partner
    pub const fn partner(pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            offset: 0,
            count: MAX_PDOS as u8,
            partner: true,
        }
    }
}

/// Data produced by a completed command
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// GET_CAPABILITY
    Capability(PpmCapability),
    /// GET_CONNECTOR_CAPABILITY
    ConnectorCapability(ConnectorCapability),
    /// GET_CONNECTOR_STATUS
    ConnectorStatus(ConnectorStatus),
    /// GET_ERROR_STATUS
    ErrorStatus(ErrorStatus),
    /// GET_VBUS_VOLTAGE, in mV
    VbusVoltage(u32),
    /// GET_PDOS
    Pdos(Vec<Pdo, MAX_PDOS>),
    /// GET_RDO
    Rdo(Rdo),
    /// GET_INFO
    Info(PdcInfo),
    /// GET_CABLE_PROPERTY
    CableProperty(CableProperty),
    /// GET_VDO
    Vdos(Vec<u32, MAX_VDOS>),
    /// GET_IDENTITY_DISCOVERY
    IdentityDiscovery(DiscoveryState),
}

/// USB-C power delivery controller driver
///
/// Command methods return `Ok(())` once the command has been accepted by the
/// controller. A driver that cannot take the command right now returns
/// [`PdError::Busy`], a failed bus transaction is reported as [`PdError::Failed`].
/// Completion, failure or busy status is delivered through the CCI event
/// sender handed to the driver at construction.
pub trait Pdc {
    /// Returns true once the controller finished its own initialization
    fn is_init_done(&mut self) -> bool;
    /// Reset the controller
    fn reset(&mut self) -> Result<(), PdError>;
    /// Reset the connector
    fn connector_reset(&mut self, reset: ConnectorReset) -> Result<(), PdError>;
    /// Read the PPM capability
    fn get_capability(&mut self) -> Result<(), PdError>;
    /// Read the connector capability
    fn get_connector_capability(&mut self) -> Result<(), PdError>;
    /// Set the CC operation mode
    fn set_ccom(&mut self, ccom: Ccom, drp_mode: DrpMode) -> Result<(), PdError>;
    /// Set the USB operation role
    fn set_uor(&mut self, uor: Uor) -> Result<(), PdError>;
    /// Set the power direction role
    fn set_pdr(&mut self, pdr: Pdr) -> Result<(), PdError>;
    /// Enable or disable the sink path
    fn set_sink_path(&mut self, enable: bool) -> Result<(), PdError>;
    /// Read the connector status
    fn get_connector_status(&mut self) -> Result<(), PdError>;
    /// Read the error status of the last failed command
    fn get_error_status(&mut self) -> Result<(), PdError>;
    /// Read the VBUS voltage
    fn get_vbus_voltage(&mut self) -> Result<(), PdError>;
    /// Read PDOs
    fn get_pdos(&mut self, request: PdoRequest) -> Result<(), PdError>;
    /// Read the negotiated RDO
    fn get_rdo(&mut self) -> Result<(), PdError>;
    /// Request a new contract
    fn set_rdo(&mut self, rdo: Rdo) -> Result<(), PdError>;
    /// Start a power level reading
    fn read_power_level(&mut self) -> Result<(), PdError>;
    /// Read chip information, `live` forces a read from the chip instead of the driver cache
    fn get_info(&mut self, live: bool) -> Result<(), PdError>;
    /// Set the Type-C current advertised as a source
    fn set_power_level(&mut self, current: TypeCCurrent) -> Result<(), PdError>;
    /// Read the cable properties
    fn get_cable_property(&mut self) -> Result<(), PdError>;
    /// Read VDOs
    fn get_vdo(&mut self, origin: VdoOrigin) -> Result<(), PdError>;
    /// Read the discover identity status
    fn get_identity_discovery(&mut self) -> Result<(), PdError>;

    /// Enable or suspend communication with the controller, takes effect immediately
    fn set_comms_state(&mut self, enabled: bool) -> Result<(), PdError>;
    /// Returns true if the port is sourcing VCONN
    fn is_vconn_sourcing(&mut self) -> bool;
    /// Take the data of the last completed command
    fn take_response(&mut self) -> Option<Response>;
}
