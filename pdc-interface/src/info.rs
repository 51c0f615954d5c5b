//! PDC chip information
use bitfield::bitfield;

/// Length of the project name reported by the chip
pub const PROJECT_NAME_LEN: usize = 12;

bitfield! {
    /// Firmware version, `major.minor.patch` packed into 24 bits
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FwVersion(u32);
    impl Debug;
    pub u8, major, set_major: 23, 16;
    pub u8, minor, set_minor: 15, 8;
    pub u8, patch, set_patch: 7, 0;
}

/// Chip information returned by GET_INFO
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdcInfo {
    /// Running firmware version
    pub fw_version: FwVersion,
    /// Supported PD revision
    pub pd_revision: u16,
    /// Supported PD version
    pub pd_version: u16,
    /// USB vendor ID in the upper 16 bits, product ID in the lower 16 bits
    pub vid_pid: u32,
    /// Chip runs from flash rather than ROM
    pub is_running_flash_code: bool,
    /// Active flash bank
    pub running_in_flash_bank: u8,
    /// NUL padded project name
    pub project_name: [u8; PROJECT_NAME_LEN],
}

impl PdcInfo {
    /// USB vendor ID
    pub fn vid(&self) -> u16 {
        (self.vid_pid >> 16) as u16
    }

    /// USB product ID
    pub fn pid(&self) -> u16 {
        self.vid_pid as u16
    }

    /// Project name up to the first NUL
    pub fn project_name(&self) -> &[u8] {
        let len = self
            .project_name
            .iter()
            .position(|c| *c == 0)
            .unwrap_or(PROJECT_NAME_LEN);
        self.project_name.get(..len).unwrap_or_default()
    }
}
