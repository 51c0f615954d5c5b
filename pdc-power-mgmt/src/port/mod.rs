//! Per-port storage
//!
//! [`PortShared`] is the part of a port visible outside its task: the CCI
//! latch, policy flags, the public request slot and the cached status. The
//! cached status is written only by the port task.
use core::cell::RefCell;

use embassy_sync::{blocking_mutex::Mutex, signal::Signal};
use embassy_time::Instant;
use embedded_services::{GlobalRawMutex, sync::AtomicFlags};
use heapless::Vec;
use pdc_interface::{
    DiscoveryState, MAX_PDOS, MAX_VDOS, PdcInfo, Pdo, PpmCapability, Rdo,
    ucsi::{CableProperty, Ccom, ConnectorCapability, ConnectorStatus, DrpMode, ErrorStatus, Pdr, TypeCCurrent, Uor},
};
use portable_atomic::{AtomicU8, Ordering};

use crate::{
    Error,
    cci::CciFlags,
    command::PublicCommand,
    config::PortConfig,
    policy::{CommsRequest, SinkPolicy, SourcePolicy, UnattachedPolicy},
};

pub(crate) mod context;
mod state;

pub use state::State;
pub(crate) use state::{InitStep, SinkStep, SourceStep, TypecStep};

/// Negotiated charge limit of a sink connection
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeLimit {
    pub current_ma: u32,
    pub voltage_mv: u32,
    pub power_mw: u32,
}

/// Type of the current connection
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attachment {
    #[default]
    None,
    /// PD sink
    Sink,
    /// PD source
    Source,
    /// Type-C only, either direction
    TypecOnly,
}

/// Snapshot of the port as last read from the PDC
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortStatus {
    pub attachment: Attachment,
    pub pd_capable: bool,
    pub connector_status: ConnectorStatus,
    pub connector_capability: ConnectorCapability,
    pub cable: CableProperty,
    /// Partner source capabilities, augmented PDOs removed
    pub src_pdos: Vec<Pdo, MAX_PDOS>,
    /// Partner sink capabilities
    pub snk_pdos: Vec<Pdo, MAX_PDOS>,
    pub rdo: Rdo,
    /// Source PDO selected by the RDO
    pub pdo: Pdo,
    pub charge: ChargeLimit,
    pub sink_path_enabled: bool,
    pub vdos: Vec<u32, MAX_VDOS>,
    pub discovery: DiscoveryState,
    pub vconn_sourcing: bool,
    pub vbus_mv: u32,
    pub vbus_timestamp: Option<Instant>,
    pub error_status: ErrorStatus,
    pub capability: PpmCapability,
    pub info: PdcInfo,
}

impl PortStatus {
    /// Forget everything learned about the partner, chip info and capability are kept
    pub(crate) fn clear_connection(&mut self) {
        *self = PortStatus {
            info: self.info,
            capability: self.capability,
            ..Default::default()
        };
    }

    /// Forget the charge contract
    pub(crate) fn clear_charge(&mut self) {
        self.pdo = Pdo::default();
        self.charge = ChargeLimit::default();
        self.src_pdos.clear();
    }
}

/// Policy inputs that callers may change at any time
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct PolicySettings {
    pub typec_current: TypeCCurrent,
    pub ccom: Ccom,
    pub drp_mode: DrpMode,
    pub uor: Uor,
    pub pdr: Pdr,
    pub active_charge: bool,
}

impl PolicySettings {
    fn new(config: &PortConfig) -> Self {
        let mut uor = Uor::default();
        uor.set_accept_dr_swap(config.accept_dr_swap);
        let mut pdr = Pdr::default();
        pdr.set_accept_pr_swap(config.accept_pr_swap);
        Self {
            typec_current: config.typec_current,
            ccom: config.ccom,
            drp_mode: config.drp_mode,
            uor,
            pdr,
            active_charge: false,
        }
    }
}

/// Public command slot of a port
///
/// A caller owns the slot from [`PublicSlot::claim`] until it collects the
/// result. The port task hands the result back through the slot itself, so a
/// result can only ever reach the caller that queued the command.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PublicSlot {
    /// Not yet picked up by the port task
    queued: Option<PublicCommand>,
    /// Picked up by the port task and not finished yet
    in_flight: bool,
    /// A caller is waiting on the slot
    claimed: bool,
    /// Result waiting for the caller
    result: Option<Result<(), Error>>,
}

impl PublicSlot {
    /// Queue `command` for a new caller
    pub fn claim(&mut self, command: PublicCommand) -> Result<(), Error> {
        if self.claimed || self.in_flight || self.queued.is_some() {
            return Err(Error::Busy);
        }

        *self = PublicSlot {
            queued: Some(command),
            claimed: true,
            ..Default::default()
        };
        Ok(())
    }

    /// Port task picks up the queued command
    pub fn take_queued(&mut self) -> Option<PublicCommand> {
        let command = self.queued.take();
        if command.is_some() {
            self.in_flight = true;
        }
        command
    }

    /// Port task finished the command it picked up
    ///
    /// The result is dropped if the caller already gave up.
    pub fn finish(&mut self, result: Result<(), Error>) {
        if !self.in_flight {
            return;
        }

        self.in_flight = false;
        if self.claimed {
            self.result = Some(result);
        }
    }

    /// Fail the outstanding command, queued or in flight
    pub fn abort(&mut self, error: Error) {
        if self.queued.take().is_some() {
            self.in_flight = true;
        }
        self.finish(Err(error));
    }

    /// Caller collects the result, releasing the slot
    pub fn take_result(&mut self) -> Option<Result<(), Error>> {
        let result = self.result.take();
        if result.is_some() {
            self.claimed = false;
        }
        result
    }

    /// Caller stops waiting
    ///
    /// A command still queued is withdrawn. A command already in flight keeps
    /// the slot busy until the port task finishes it.
    pub fn give_up(&mut self) {
        self.queued = None;
        self.claimed = false;
        self.result = None;
    }
}

#[derive(Default)]
pub(crate) struct SharedData {
    pub status: PortStatus,
    pub settings: PolicySettings,
    pub public: PublicSlot,
}

/// Port storage shared between the port task, the driver callback and callers
pub struct PortShared {
    pub(crate) cci: AtomicFlags<CciFlags>,
    pub(crate) unattached_policy: AtomicFlags<UnattachedPolicy>,
    pub(crate) sink_policy: AtomicFlags<SinkPolicy>,
    pub(crate) source_policy: AtomicFlags<SourcePolicy>,
    pub(crate) comms: AtomicFlags<CommsRequest>,
    pub(crate) wake: Signal<GlobalRawMutex, ()>,
    state: AtomicU8,
    attach: AtomicU8,
    data: Mutex<GlobalRawMutex, RefCell<SharedData>>,
}

impl Default for PortShared {
    fn default() -> Self {
        Self::new()
    }
}

impl PortShared {
    pub fn new() -> Self {
        Self {
            cci: AtomicFlags::new(),
            unattached_policy: AtomicFlags::new(),
            sink_policy: AtomicFlags::new(),
            source_policy: AtomicFlags::new(),
            comms: AtomicFlags::new(),
            wake: Signal::new(),
            state: AtomicU8::new(State::Init as u8),
            attach: AtomicU8::new(State::Init as u8),
            data: Mutex::new(RefCell::new(SharedData::default())),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut SharedData) -> R) -> R {
        self.data.lock(|data| f(&mut data.borrow_mut()))
    }

    /// Copy of the cached status
    pub fn status(&self) -> PortStatus {
        self.with(|data| data.status.clone())
    }

    /// Current task state, one of the send-command states while a command is in flight
    pub fn state(&self) -> State {
        State::try_from(self.state.load(Ordering::Acquire)).unwrap_or(State::Init)
    }

    /// Current attach state, never one of the send-command states
    pub fn attach_state(&self) -> State {
        State::try_from(self.attach.load(Ordering::Acquire)).unwrap_or(State::Init)
    }

    pub(crate) fn publish_state(&self, state: State, attach: State) {
        self.attach.store(attach.into(), Ordering::Release);
        self.state.store(state.into(), Ordering::Release);
    }

    /// Load the policy settings from the port configuration
    pub(crate) fn configure(&self, config: &PortConfig) {
        self.with(|data| data.settings = PolicySettings::new(config));
    }

    /// Reset everything learned from the PDC for a fresh start from Init
    ///
    /// Policy settings survive, they describe what the platform wants rather
    /// than what the PDC reported.
    pub(crate) fn reinitialize(&self) {
        self.cci.clear_all();
        self.sink_policy.clear_all();
        self.source_policy.clear_all();
        self.arm_unattached_policy();
        self.with(|data| data.status.clear_connection());
        self.publish_state(State::Init, State::Init);
    }

    /// Program CC mode and Type-C current on the next unattached pass
    pub(crate) fn arm_unattached_policy(&self) {
        self.unattached_policy
            .set(UnattachedPolicy::CC_MODE | UnattachedPolicy::TCC);
    }

    /// Fail the outstanding public command, the port task will not finish it
    pub(crate) fn abort_public(&self, error: Error) {
        self.with(|data| data.public.abort(error));
    }
}

/// Boot time registration of a port
pub struct PortRegistration<'a, D> {
    pub shared: &'a PortShared,
    pub driver: &'a D,
    pub config: PortConfig,
}

impl<'a, D> PortRegistration<'a, D> {
    pub fn new(shared: &'a PortShared, driver: &'a D, config: PortConfig) -> Self {
        Self { shared, driver, config }
    }
}
