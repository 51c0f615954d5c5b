//! Power and request data object helpers
use bitfield::bitfield;
use num_enum::{FromPrimitive, IntoPrimitive};

/// Maximum number of PDOs in a capabilities message
pub const MAX_PDOS: usize = 7;

/// PDO supply type, bits 30-31
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PdoKind {
    /// Fixed supply
    #[num_enum(default)]
    Fixed = 0,
    /// Battery
    Battery = 1,
    /// Variable supply
    Variable = 2,
    /// Augmented PDO (PPS/AVS)
    Augmented = 3,
}

/// Fast role swap current requested by a dual-role sink
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrsCurrent {
    /// FRS not supported
    #[num_enum(default)]
    NotSupported = 0,
    /// Default USB power
    Default = 1,
    /// 1.5 A at 5 V
    Current1A5 = 2,
    /// 3.0 A at 5 V
    Current3A0 = 3,
}

bitfield! {
    /// Power data object
    ///
    /// Fixed supply field accessors are only meaningful when [`Pdo::kind`] is [`PdoKind::Fixed`].
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Pdo(u32);
    impl Debug;
    u8, raw_kind, _: 31, 30;
    pub bool, dual_role_power, set_dual_role_power: 29;
    pub bool, usb_suspend, set_usb_suspend: 28;
    pub bool, unconstrained_power, set_unconstrained_power: 27;
    pub bool, usb_comms_capable, set_usb_comms_capable: 26;
    pub bool, dual_role_data, set_dual_role_data: 25;
    u8, raw_frs_current, _: 24, 23;
    /// Voltage in 50 mV units
    pub u16, voltage_50mv, set_voltage_50mv: 19, 10;
    /// Maximum current in 10 mA units
    pub u16, current_10ma, set_current_10ma: 9, 0;
}

impl Pdo {
    /// Build a fixed supply PDO
    pub fn fixed(voltage_mv: u32, current_ma: u32) -> Self {
        let mut pdo = Pdo(0);
        pdo.set_voltage_50mv((voltage_mv / 50) as u16);
        pdo.set_current_10ma((current_ma / 10) as u16);
        pdo
    }

    /// Supply type
    pub fn kind(&self) -> PdoKind {
        PdoKind::from(self.raw_kind())
    }

    /// Returns true for augmented PDOs
    pub fn is_augmented(&self) -> bool {
        self.kind() == PdoKind::Augmented
    }

    /// Fixed supply voltage in mV
    pub fn fixed_voltage_mv(&self) -> u32 {
        self.voltage_50mv() as u32 * 50
    }

    /// Fixed supply maximum current in mA
    pub fn fixed_current_ma(&self) -> u32 {
        self.current_10ma() as u32 * 10
    }

    /// FRS current required by a dual-role sink (sink capabilities only)
    pub fn frs_current(&self) -> FrsCurrent {
        FrsCurrent::from(self.raw_frs_current())
    }
}

bitfield! {
    /// Request data object
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Rdo(u32);
    impl Debug;
    /// 1-based position of the selected PDO in the source capabilities
    pub u8, object_position, set_object_position: 30, 28;
    /// Operating current in 10 mA units (fixed supplies)
    pub u16, operating_current_10ma, set_operating_current_10ma: 19, 10;
    /// Maximum operating current in 10 mA units (fixed supplies)
    pub u16, max_current_10ma, set_max_current_10ma: 9, 0;
}

impl Rdo {
    /// Index into the source capabilities list, if the position is valid
    pub fn pdo_index(&self) -> Option<usize> {
        (self.object_position() as usize).checked_sub(1)
    }
}
