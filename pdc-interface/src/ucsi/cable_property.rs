//! GET_CABLE_PROPERTY response
use super::{get_bits, set_bits};

/// Decoded GET_CABLE_PROPERTY response
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CableProperty {
    /// Supported speeds bitmap, bits 0-15
    pub speed_supported: u16,
    /// Current capability in 50 mA units, bits 16-23
    pub current_capability: u8,
    /// Cable carries VBUS end to end, bit 24
    pub vbus_in_cable: bool,
    /// Active cable, bit 25
    pub active_cable: bool,
    /// Cable is directional, bit 26
    pub directionality: bool,
    /// Plug end type, bits 27-28
    pub plug_end_type: u8,
    /// Cable supports alternate modes, bit 29
    pub mode_support: bool,
    /// Cable PD revision, bits 30-31
    pub pd_revision: u8,
    /// Cable latency, bits 32-35
    pub latency: u8,
}

impl CableProperty {
    /// Size of the response in bytes
    pub const LEN: usize = 5;

    /// Unpack from the UCSI little-endian byte layout
    pub fn from_bytes(data: &[u8; Self::LEN]) -> Self {
        Self {
            speed_supported: get_bits(data, 0, 16) as u16,
            current_capability: get_bits(data, 16, 8) as u8,
            vbus_in_cable: get_bits(data, 24, 1) != 0,
            active_cable: get_bits(data, 25, 1) != 0,
            directionality: get_bits(data, 26, 1) != 0,
            plug_end_type: get_bits(data, 27, 2) as u8,
            mode_support: get_bits(data, 29, 1) != 0,
            pd_revision: get_bits(data, 30, 2) as u8,
            latency: get_bits(data, 32, 4) as u8,
        }
    }

    /// Pack into the UCSI little-endian byte layout
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut data = [0u8; Self::LEN];
        set_bits(&mut data, 0, 16, self.speed_supported as u32);
        set_bits(&mut data, 16, 8, self.current_capability as u32);
        set_bits(&mut data, 24, 1, self.vbus_in_cable as u32);
        set_bits(&mut data, 25, 1, self.active_cable as u32);
        set_bits(&mut data, 26, 1, self.directionality as u32);
        set_bits(&mut data, 27, 2, self.plug_end_type as u32);
        set_bits(&mut data, 29, 1, self.mode_support as u32);
        set_bits(&mut data, 30, 2, self.pd_revision as u32);
        set_bits(&mut data, 32, 4, self.latency as u32);
        data
    }

    /// Maximum cable current in mA
    pub fn current_ma(&self) -> u16 {
        self.current_capability as u16 * 50
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack() {
        let data = [0x00, 0x00, 0x64, 0x31, 0x05];
        let cable = CableProperty::from_bytes(&data);
        assert_eq!(cable.current_capability, 100);
        assert_eq!(cable.current_ma(), 5000);
        assert!(cable.vbus_in_cable);
        assert!(!cable.active_cable);
        assert_eq!(cable.plug_end_type, 2);
        assert!(cable.mode_support);
        assert_eq!(cable.latency, 5);
        assert_eq!(cable.to_bytes(), data);
    }
}
