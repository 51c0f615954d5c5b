//! Deferred policy actions
//!
//! Any context may set these flags. The port task consumes each flag with a
//! test-and-clear when its attach state allows the action.
use bitflags::bitflags;

bitflags! {
    /// Actions applied while unattached
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct UnattachedPolicy: u32 {
        /// Program the CC operation mode
        const CC_MODE = 1 << 0;
        /// Program the advertised Type-C current
        const TCC = 1 << 1;
    }
}

bitflags! {
    /// Actions applied while attached as a sink
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SinkPolicy: u32 {
        /// Request a power role swap to source
        const SWAP_TO_SRC = 1 << 0;
        /// Active charge port changed
        const ACTIVE_CHARGE = 1 << 1;
        /// Partner advertised new capabilities
        const NEW_POWER_REQUEST = 1 << 2;
    }
}

bitflags! {
    /// Actions applied while attached as a source
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SourcePolicy: u32 {
        /// Request a power role swap to sink
        const SWAP_TO_SNK = 1 << 0;
        /// Program the advertised Type-C current
        const TCC = 1 << 1;
    }
}

bitflags! {
    /// Requests for the suspend/resume barrier
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CommsRequest: u32 {
        const SUSPEND = 1 << 0;
        const RESUME = 1 << 1;
    }
}

/// Dual role behavior requested by the platform
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DualRoleState {
    /// Toggle between source and sink when unattached
    ToggleOn,
    /// Sink only when unattached, keep the current role when attached
    ToggleOff,
    /// Keep the current role
    Freeze,
    /// Sink only, swap to sink when attached as a source
    ForceSink,
    /// Source only, swap to source when attached as a sink
    ForceSource,
}
