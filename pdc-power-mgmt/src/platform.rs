//! Hooks into the charging side of the platform
use crate::PortId;

/// Charge supplier classification of a sink connection
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DualRoleCapability {
    /// Not connected as a sink
    #[default]
    Unknown,
    /// Partner is a dedicated charger
    Dedicated,
    /// Partner can also sink, only charge from it on request
    DualRole,
}

/// Platform charge manager
///
/// Called from port tasks, implementations must not block.
pub trait Platform {
    /// Set the input current limit of the port, `0` mA disables charging from it
    fn set_input_current_limit(&self, port: PortId, current_ma: u32, voltage_mv: u32);
    /// Cap the charge current of the port, `None` removes the ceiling
    fn set_charge_ceiling(&self, port: PortId, ceiling_ma: Option<u32>);
    /// Update the supplier classification of the port
    fn update_dual_role(&self, port: PortId, capability: DualRoleCapability);
    /// The partner or the PDC performed a hard reset
    fn notify_hard_reset(&self, port: PortId);
}
