//! GET_CONNECTOR_STATUS response
use bitfield::bitfield;

use super::{ConnectorPartnerType, PowerOperationMode, get_bits, set_bits};

bitfield! {
    /// Connector status change bits
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct ConnectorStatusChange(u16);
    impl Debug;
    pub bool, external_supply, set_external_supply: 1;
    pub bool, power_operation_mode, set_power_operation_mode: 2;
    pub bool, attention, set_attention: 3;
    pub bool, supported_provider_caps, set_supported_provider_caps: 5;
    pub bool, negotiated_power_level, set_negotiated_power_level: 6;
    pub bool, pd_reset_complete, set_pd_reset_complete: 7;
    pub bool, supported_cam, set_supported_cam: 8;
    pub bool, battery_charging_status, set_battery_charging_status: 9;
    pub bool, connector_partner, set_connector_partner: 11;
    pub bool, power_direction, set_power_direction: 12;
    pub bool, sink_path_status, set_sink_path_status: 13;
    pub bool, connect_change, set_connect_change: 14;
    pub bool, error, set_error: 15;
}

/// Connector partner flag: USB 2.0 or 3.x data
const PARTNER_FLAG_USB: u8 = 1 << 0;
/// Connector partner flag: alternate mode
const PARTNER_FLAG_ALT_MODE: u8 = 1 << 1;
/// Connector partner flag: USB4 gen 3
const PARTNER_FLAG_USB4_GEN3: u8 = 1 << 2;
/// Connector partner flag: USB4 gen 4
const PARTNER_FLAG_USB4_GEN4: u8 = 1 << 3;

/// Decoded GET_CONNECTOR_STATUS response
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectorStatus {
    /// Status change bits, bits 0-15
    pub change: ConnectorStatusChange,
    /// Power operation mode, bits 16-18
    pub power_operation_mode: PowerOperationMode,
    /// Partner connected, bit 19
    pub connect_status: bool,
    /// Port operates as a provider (source), bit 20
    pub power_direction: bool,
    /// Connector partner flags, bits 21-28
    pub partner_flags: u8,
    /// Connector partner type, bits 29-31
    pub partner_type: ConnectorPartnerType,
    /// Negotiated RDO, bits 32-63
    pub rdo: u32,
    /// Battery charging capability status, bits 64-65
    pub battery_charging_status: u8,
    /// Provider capabilities limited reason, bits 66-69
    pub provider_caps_limited: u8,
    /// BCD PD revision of the contract, bits 70-85
    pub bcd_pd_version: u16,
    /// Flipped orientation, bit 86
    pub orientation: bool,
    /// Sink path enabled, bit 87
    pub sink_path_status: bool,
    /// Reverse current protection triggered, bit 88
    pub reverse_current_protection: bool,
    /// Power reading fields are valid, bit 89
    pub power_reading_ready: bool,
    /// Current resolution in 5 mA steps, bits 90-94
    pub current_scale: u8,
    /// Peak current reading, bits 95-110
    pub peak_current: u16,
    /// Average current reading, bits 111-126
    pub average_current: u16,
    /// Voltage resolution in 5 mV steps, bits 127-130
    pub voltage_scale: u8,
    /// VBUS voltage reading, bits 131-146
    pub voltage_reading: u16,
}

impl ConnectorStatus {
    /// Size of the response in bytes
    pub const LEN: usize = 19;

    /// Unpack from the UCSI little-endian byte layout
    pub fn from_bytes(data: &[u8; Self::LEN]) -> Self {
        Self {
            change: ConnectorStatusChange(get_bits(data, 0, 16) as u16),
            power_operation_mode: PowerOperationMode::from(get_bits(data, 16, 3) as u8),
            connect_status: get_bits(data, 19, 1) != 0,
            power_direction: get_bits(data, 20, 1) != 0,
            partner_flags: get_bits(data, 21, 8) as u8,
            partner_type: ConnectorPartnerType::from(get_bits(data, 29, 3) as u8),
            rdo: get_bits(data, 32, 32),
            battery_charging_status: get_bits(data, 64, 2) as u8,
            provider_caps_limited: get_bits(data, 66, 4) as u8,
            bcd_pd_version: get_bits(data, 70, 16) as u16,
            orientation: get_bits(data, 86, 1) != 0,
            sink_path_status: get_bits(data, 87, 1) != 0,
            reverse_current_protection: get_bits(data, 88, 1) != 0,
            power_reading_ready: get_bits(data, 89, 1) != 0,
            current_scale: get_bits(data, 90, 5) as u8,
            peak_current: get_bits(data, 95, 16) as u16,
            average_current: get_bits(data, 111, 16) as u16,
            voltage_scale: get_bits(data, 127, 4) as u8,
            voltage_reading: get_bits(data, 131, 16) as u16,
        }
    }

    /// Pack into the UCSI little-endian byte layout
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut data = [0u8; Self::LEN];
        set_bits(&mut data, 0, 16, self.change.0 as u32);
        set_bits(&mut data, 16, 3, u8::from(self.power_operation_mode) as u32);
        set_bits(&mut data, 19, 1, self.connect_status as u32);
        set_bits(&mut data, 20, 1, self.power_direction as u32);
        set_bits(&mut data, 21, 8, self.partner_flags as u32);
        set_bits(&mut data, 29, 3, u8::from(self.partner_type) as u32);
        set_bits(&mut data, 32, 32, self.rdo);
        set_bits(&mut data, 64, 2, self.battery_charging_status as u32);
        set_bits(&mut data, 66, 4, self.provider_caps_limited as u32);
        set_bits(&mut data, 70, 16, self.bcd_pd_version as u32);
        set_bits(&mut data, 86, 1, self.orientation as u32);
        set_bits(&mut data, 87, 1, self.sink_path_status as u32);
        set_bits(&mut data, 88, 1, self.reverse_current_protection as u32);
        set_bits(&mut data, 89, 1, self.power_reading_ready as u32);
        set_bits(&mut data, 90, 5, self.current_scale as u32);
        set_bits(&mut data, 95, 16, self.peak_current as u32);
        set_bits(&mut data, 111, 16, self.average_current as u32);
        set_bits(&mut data, 127, 4, self.voltage_scale as u32);
        set_bits(&mut data, 131, 16, self.voltage_reading as u32);
        data
    }

    /// VBUS voltage in mV derived from the power reading fields
    pub fn vbus_mv(&self) -> u32 {
        self.voltage_reading as u32 * self.voltage_scale as u32 * 5
    }

    /// Partner supports USB data
    pub fn partner_usb(&self) -> bool {
        self.partner_flags & PARTNER_FLAG_USB != 0
    }

    /// Partner entered an alternate mode
    pub fn partner_alt_mode(&self) -> bool {
        self.partner_flags & PARTNER_FLAG_ALT_MODE != 0
    }

    /// Partner supports USB4 gen 3 or gen 4
    pub fn partner_usb4(&self) -> bool {
        self.partner_flags & (PARTNER_FLAG_USB4_GEN3 | PARTNER_FLAG_USB4_GEN4) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_sink_pd_contract() {
        let mut data = [0u8; ConnectorStatus::LEN];
        // Connect change, PD operation, connected, consumer
        data[1] = 0x40;
        data[2] = 0x0b;
        // UFP attached, partner type 2 in bits 29-31
        data[3] = 0x40;
        // RDO
        data[4..8].copy_from_slice(&0x2000_0000u32.to_le_bytes());

        let status = ConnectorStatus::from_bytes(&data);
        assert!(status.change.connect_change());
        assert_eq!(status.power_operation_mode, PowerOperationMode::Pd);
        assert!(status.connect_status);
        assert!(!status.power_direction);
        assert_eq!(status.partner_type, ConnectorPartnerType::UfpAttached);
        assert_eq!(status.rdo, 0x2000_0000);
        assert_eq!(status.to_bytes(), data);
    }

    #[test]
    fn test_vbus_reading() {
        let status = ConnectorStatus {
            connect_status: true,
            power_reading_ready: true,
            voltage_scale: 10,
            voltage_reading: 100,
            ..Default::default()
        };

        let unpacked = ConnectorStatus::from_bytes(&status.to_bytes());
        assert_eq!(unpacked, status);
        assert_eq!(unpacked.vbus_mv(), 5000);
    }

    #[test]
    fn test_partner_flags() {
        let mut data = [0u8; ConnectorStatus::LEN];
        // Partner flags start at bit 21: USB and USB4 gen 4
        data[2] = 0x20;
        data[3] = 0x01;

        let status = ConnectorStatus::from_bytes(&data);
        assert_eq!(status.partner_flags, PARTNER_FLAG_USB | PARTNER_FLAG_USB4_GEN4);
        assert!(status.partner_usb());
        assert!(status.partner_usb4());
        assert!(!status.partner_alt_mode());
    }

    #[test]
    fn test_orientation_and_sink_path_bits() {
        let status = ConnectorStatus {
            orientation: true,
            sink_path_status: true,
            ..Default::default()
        };
        let data = status.to_bytes();
        // Bits 86 and 87 live in the top of byte 10
        assert_eq!(data[10], 0xc0);
    }
}
