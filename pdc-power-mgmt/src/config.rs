//! Service and port configuration
use embassy_time::Duration;
use pdc_interface::ucsi::{Ccom, DrpMode, TypeCCurrent};

/// Service configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Port task period when there is nothing to do
    pub tick: Duration,
    /// How long a command that the driver refuses to start is retried
    pub start_timeout: Duration,
    /// How long to wait for the CCI of a started command
    pub wait_timeout: Duration,
    /// Resends after a CCI error
    pub max_resends: u8,
    /// Resends after a CCI error for SET_UOR and SET_PDR
    pub max_swap_resends: u8,
    /// Poll period of blocking public calls
    pub public_poll: Duration,
    /// Bound on blocking public calls
    pub public_timeout: Duration,
    /// Number of ports allowed to source 3 A at the same time
    pub max_3a_ports: u8,
    /// Delay before handing out a source current slot that was just taken away
    pub rearm_delay: Duration,
    /// Lifetime of a cached VBUS reading
    pub vbus_cache: Duration,
    /// Minimum power of a dual-role partner to be treated as a dedicated charger, in mW
    pub drp_charge_power_min_mw: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(25),
            start_timeout: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(1),
            max_resends: 2,
            max_swap_resends: 1,
            public_poll: Duration::from_millis(10),
            public_timeout: Duration::from_secs(2),
            max_3a_ports: 1,
            // tSinkAdj
            rearm_delay: Duration::from_millis(55),
            vbus_cache: Duration::from_millis(500),
            drp_charge_power_min_mw: 27_000,
        }
    }
}

/// Per-port configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortConfig {
    /// Type-C current advertised as a source when no 3 A slot is held
    pub typec_current: TypeCCurrent,
    /// CC operation mode
    pub ccom: Ccom,
    /// DRP preference
    pub drp_mode: DrpMode,
    /// Accept data role swaps from the partner
    pub accept_dr_swap: bool,
    /// Accept power role swaps from the partner
    pub accept_pr_swap: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            typec_current: TypeCCurrent::Current1A5,
            ccom: Ccom::Drp,
            drp_mode: DrpMode::TrySrc,
            accept_dr_swap: true,
            accept_pr_swap: true,
        }
    }
}
