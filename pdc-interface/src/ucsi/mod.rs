//! UCSI data structures shared between the power management service and PDC drivers
//!
//! Multi-byte UCSI responses are modelled as plain structs with explicit
//! `from_bytes`/`to_bytes` routines. The bit positions are part of the UCSI
//! wire contract and are spelled out in each routine.
use bitfield::bitfield;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

mod cable_property;
mod connector_status;

pub use cable_property::CableProperty;
pub use connector_status::{ConnectorStatus, ConnectorStatusChange};

/// Invalid raw value for a UCSI enum
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue(pub u8);

/// USB Type-C current advertised as a source
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = InvalidValue, constructor = InvalidValue))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TypeCCurrent {
    /// Determined by the PPM
    PpmDefined = 0,
    /// 3.0 A
    Current3A0 = 1,
    /// 1.5 A
    #[default]
    Current1A5 = 2,
    /// USB default current
    UsbDefault = 3,
}

impl TypeCCurrent {
    /// Current in mA at 5 V, if the advertisement defines one
    pub fn milliamps(self) -> Option<u16> {
        match self {
            TypeCCurrent::Current3A0 => Some(3000),
            TypeCCurrent::Current1A5 => Some(1500),
            TypeCCurrent::UsbDefault => Some(500),
            TypeCCurrent::PpmDefined => None,
        }
    }
}

/// CC operation mode
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = InvalidValue, constructor = InvalidValue))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Ccom {
    /// Present Rp, source only
    Rp = 0,
    /// Present Rd, sink only
    Rd = 1,
    /// Toggle between Rp and Rd
    #[default]
    Drp = 2,
}

/// Dual role toggling preference
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = InvalidValue, constructor = InvalidValue))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DrpMode {
    /// Plain DRP toggling
    Normal = 0,
    /// Prefer the source role
    #[default]
    TrySrc = 1,
    /// Prefer the sink role
    TrySnk = 2,
}

/// PDO list selector
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = InvalidValue, constructor = InvalidValue))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PdoType {
    /// Sink capabilities
    Sink = 0,
    /// Source capabilities
    Source = 1,
}

/// Connector reset type
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = InvalidValue, constructor = InvalidValue))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectorReset {
    /// PD hard reset
    #[default]
    Hard = 0,
    /// PD soft reset
    Soft = 1,
}

/// Power operation mode reported in GET_CONNECTOR_STATUS
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerOperationMode {
    /// Reserved or not connected
    #[default]
    Reserved = 0,
    /// USB default operation
    UsbDefault = 1,
    /// Battery charging
    Bc = 2,
    /// USB power delivery contract
    Pd = 3,
    /// Type-C current 1.5 A
    TypeC1A5 = 4,
    /// Type-C current 3.0 A
    TypeC3A0 = 5,
    /// Type-C current 5.0 A
    TypeC5A0 = 6,
}

impl PowerOperationMode {
    /// Current the partner offers without a PD contract, in mA
    pub fn typec_current_ma(self) -> u16 {
        match self {
            PowerOperationMode::TypeC1A5 => 1500,
            PowerOperationMode::TypeC3A0 => 3000,
            PowerOperationMode::TypeC5A0 => 5000,
            _ => 500,
        }
    }
}

/// Connector partner type reported in GET_CONNECTOR_STATUS
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectorPartnerType {
    /// Reserved or not connected
    #[default]
    Reserved = 0,
    /// Partner is a DFP
    DfpAttached = 1,
    /// Partner is a UFP
    UfpAttached = 2,
    /// Powered cable without a UFP
    PoweredCableNoUfp = 3,
    /// Powered cable with a UFP
    PoweredCableUfp = 4,
    /// Debug accessory
    DebugAccessory = 5,
    /// Audio adapter accessory
    AudioAccessory = 6,
}

bitfield! {
    /// Command status and connector change indication
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Cci(u32);
    impl Debug;
    pub bool, end_of_message, set_end_of_message: 0;
    pub u8, connector_change, set_connector_change: 7, 1;
    pub u8, data_len, set_data_len: 15, 8;
    pub bool, vendor_defined_indicator, set_vendor_defined_indicator: 16;
    pub bool, security_request, set_security_request: 23;
    pub bool, fw_update_request, set_fw_update_request: 24;
    pub bool, not_supported, set_not_supported: 25;
    pub bool, cancel_completed, set_cancel_completed: 26;
    pub bool, reset_completed, set_reset_completed: 27;
    pub bool, busy, set_busy: 28;
    pub bool, ack_command, set_ack_command: 29;
    pub bool, error, set_error: 30;
    pub bool, command_completed, set_command_completed: 31;
}

impl Cci {
    /// Command completed without error
    pub const COMMAND_COMPLETED: Cci = Cci(1 << 31);
    /// Command failed
    pub const ERROR: Cci = Cci(1 << 30);
    /// PDC is busy, command not finished yet
    pub const BUSY: Cci = Cci(1 << 28);
    /// PDC reset finished
    pub const RESET_COMPLETED: Cci = Cci(1 << 27);
    /// Unsolicited vendor defined event
    pub const VENDOR_DEFINED: Cci = Cci(1 << 16);
}

impl core::ops::BitOr for Cci {
    type Output = Cci;

    fn bitor(self, rhs: Self) -> Self::Output {
        Cci(self.0 | rhs.0)
    }
}

bitfield! {
    /// GET_CONNECTOR_CAPABILITY response
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct ConnectorCapability(u32);
    impl Debug;
    pub bool, rp_only, set_rp_only: 0;
    pub bool, rd_only, set_rd_only: 1;
    pub bool, drp, set_drp: 2;
    pub bool, analog_audio, set_analog_audio: 3;
    pub bool, debug_accessory, set_debug_accessory: 4;
    pub bool, usb2, set_usb2: 5;
    pub bool, usb3, set_usb3: 6;
    pub bool, alternate_mode, set_alternate_mode: 7;
    pub bool, provider, set_provider: 8;
    pub bool, consumer, set_consumer: 9;
    pub bool, swap_to_dfp, set_swap_to_dfp: 10;
    pub bool, swap_to_ufp, set_swap_to_ufp: 11;
    pub bool, swap_to_src, set_swap_to_src: 12;
    pub bool, swap_to_snk, set_swap_to_snk: 13;
    pub bool, usb4_gen2, set_usb4_gen2: 14;
    pub bool, epr_source, set_epr_source: 15;
    pub bool, epr_sink, set_epr_sink: 16;
    pub bool, usb4_gen3, set_usb4_gen3: 17;
    pub bool, usb4_gen4, set_usb4_gen4: 18;
    pub bool, fw_update, set_fw_update: 22;
    pub bool, security, set_security: 23;
    pub bool, reverse_current_protection, set_reverse_current_protection: 26;
    pub u8, partner_pd_revision, set_partner_pd_revision: 28, 27;
}

bitfield! {
    /// SET_UOR command, USB operation role
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Uor(u8);
    impl Debug;
    pub bool, swap_to_dfp, set_swap_to_dfp: 0;
    pub bool, swap_to_ufp, set_swap_to_ufp: 1;
    pub bool, accept_dr_swap, set_accept_dr_swap: 2;
}

bitfield! {
    /// SET_PDR command, power direction role
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Pdr(u8);
    impl Debug;
    pub bool, swap_to_src, set_swap_to_src: 0;
    pub bool, swap_to_snk, set_swap_to_snk: 1;
    pub bool, accept_pr_swap, set_accept_pr_swap: 2;
}

bitfield! {
    /// GET_ERROR_STATUS response
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct ErrorStatus(u32);
    impl Debug;
    pub bool, unrecognized_command, set_unrecognized_command: 0;
    pub bool, non_existent_connector, set_non_existent_connector: 1;
    pub bool, invalid_param, set_invalid_param: 2;
    pub bool, incompatible_partner, set_incompatible_partner: 3;
    pub bool, cc_comm_error, set_cc_comm_error: 4;
    pub bool, dead_battery, set_dead_battery: 5;
    pub bool, contract_negotiation_failed, set_contract_negotiation_failed: 6;
    pub bool, overcurrent, set_overcurrent: 7;
    pub bool, undefined, set_undefined: 8;
    pub bool, partner_rejected_swap, set_partner_rejected_swap: 9;
    pub bool, hard_reset, set_hard_reset: 10;
    pub bool, ppm_policy_conflict, set_ppm_policy_conflict: 11;
    pub bool, swap_rejected, set_swap_rejected: 12;
    pub bool, reverse_current_protection, set_reverse_current_protection: 13;
    pub bool, set_sink_path_rejected, set_set_sink_path_rejected: 14;
    pub bool, ping_retry_count, set_ping_retry_count: 16;
    pub bool, i2c_read_error, set_i2c_read_error: 17;
    pub bool, i2c_write_error, set_i2c_write_error: 18;
}

/// Read `width` bits starting at bit `lsb` from a little-endian byte buffer
///
/// Bits outside of `data` read as zero.
pub(crate) fn get_bits(data: &[u8], lsb: usize, width: usize) -> u32 {
    let mut value = 0u32;
    for i in 0..width.min(32) {
        let bit = lsb + i;
        let set = data.get(bit / 8).is_some_and(|byte| byte & (1 << (bit % 8)) != 0);
        if set {
            value |= 1 << i;
        }
    }
    value
}

/// Write the low `width` bits of `value` starting at bit `lsb` into a little-endian byte buffer
///
/// Bits outside of `data` are dropped.
pub(crate) fn set_bits(data: &mut [u8], lsb: usize, width: usize, value: u32) {
    for i in 0..width.min(32) {
        let bit = lsb + i;
        if let Some(byte) = data.get_mut(bit / 8) {
            let mask = 1u8 << (bit % 8);
            if value & (1 << i) != 0 {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }
}
