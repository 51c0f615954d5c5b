//! State owned by the port task
use embassy_time::{Duration, Instant};
use pdc_interface::{
    PdoRequest, Rdo, VdoOrigin,
    ucsi::{Ccom, ConnectorReset, DrpMode, PdoType, Pdr, TypeCCurrent, Uor},
};

use super::{InitStep, SinkStep, SourceStep, State, TypecStep};
use crate::command::{Command, CommandRequest};

/// Send-command sub-machine phase
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Phase {
    /// No command in flight
    #[default]
    Idle,
    /// Dispatching to the driver
    Start,
    /// Waiting for the CCI
    Wait,
}

/// Which request slot the command in flight came from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Origin {
    Internal,
    Public,
}

/// Send-command sub-machine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SendCommand {
    pub phase: Phase,
    /// Attach state to go back to once the command is done
    pub return_state: State,
    pub internal: CommandRequest,
    pub public: CommandRequest,
    /// Request in flight
    pub origin: Origin,
    pub start_deadline: Instant,
    pub wait_deadline: Instant,
    pub resends: u8,
}

impl SendCommand {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            return_state: State::Init,
            internal: CommandRequest::default(),
            public: CommandRequest::default(),
            origin: Origin::Internal,
            start_deadline: Instant::MIN,
            wait_deadline: Instant::MIN,
            resends: 0,
        }
    }

    /// Pick the request to send, internal requests go first
    pub fn select(&self) -> Option<Origin> {
        if self.internal.pending {
            Some(Origin::Internal)
        } else if self.public.pending {
            Some(Origin::Public)
        } else {
            None
        }
    }

    /// Request in flight
    pub fn active(&self) -> &CommandRequest {
        match self.origin {
            Origin::Internal => &self.internal,
            Origin::Public => &self.public,
        }
    }

    pub fn active_mut(&mut self) -> &mut CommandRequest {
        match self.origin {
            Origin::Internal => &mut self.internal,
            Origin::Public => &mut self.public,
        }
    }
}

/// Arguments for the command in flight
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Scratch {
    pub ccom: Ccom,
    pub drp_mode: DrpMode,
    pub typec_current: TypeCCurrent,
    pub uor: Uor,
    pub pdr: Pdr,
    pub sink_path: bool,
    pub pdo_request: PdoRequest,
    pub rdo: Rdo,
    pub connector_reset: ConnectorReset,
    pub info_live: bool,
    pub vdo_origin: VdoOrigin,
}

impl Default for Scratch {
    fn default() -> Self {
        Self {
            ccom: Ccom::default(),
            drp_mode: DrpMode::default(),
            typec_current: TypeCCurrent::default(),
            uor: Uor::default(),
            pdr: Pdr::default(),
            sink_path: false,
            pdo_request: PdoRequest::partner(PdoType::Source),
            rdo: Rdo::default(),
            connector_reset: ConnectorReset::default(),
            info_live: false,
            vdo_origin: VdoOrigin::Partner,
        }
    }
}

/// Everything the port task keeps between steps
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PortContext {
    /// Current attach state, never one of the send-command states
    pub attach: State,
    pub send: SendCommand,
    pub scratch: Scratch,
    pub init_step: InitStep,
    pub sink_step: SinkStep,
    pub source_step: SourceStep,
    pub typec_step: TypecStep,
}

impl PortContext {
    pub fn new() -> Self {
        Self {
            attach: State::Init,
            send: SendCommand::new(),
            scratch: Scratch::default(),
            init_step: InitStep::default(),
            sink_step: SinkStep::default(),
            source_step: SourceStep::default(),
            typec_step: TypecStep::default(),
        }
    }

    /// State reported to callers
    pub fn task_state(&self) -> State {
        match self.send.phase {
            Phase::Idle => self.attach,
            Phase::Start => State::SendCmdStart,
            Phase::Wait => State::SendCmdWait,
        }
    }

    /// Suspension is only honoured between commands, outside of setup sequences
    pub fn can_suspend(&self) -> bool {
        if self.send.phase != Phase::Idle {
            return false;
        }

        match self.attach {
            State::Init => self.init_step == InitStep::WaitReady,
            State::Unattached => true,
            State::SnkAttached => self.sink_step == SinkStep::Run,
            State::SrcAttached => self.source_step == SourceStep::Run,
            State::SnkTypecOnly | State::SrcTypecOnly => self.typec_step == TypecStep::Run,
            State::Suspended | State::SendCmdStart | State::SendCmdWait => false,
        }
    }

    /// Queue an internal command and enter the send-command sub-machine
    pub fn queue_internal(&mut self, command: Command, now: Instant, start_timeout: Duration) {
        self.send.internal.queue(command);
        self.begin(now, start_timeout);
    }

    /// Enter the send-command sub-machine for a public command
    pub fn queue_public(&mut self, command: Command, now: Instant, start_timeout: Duration) {
        self.send.public.queue(command);
        self.begin(now, start_timeout);
    }

    fn begin(&mut self, now: Instant, start_timeout: Duration) {
        if let Some(origin) = self.send.select() {
            self.send.origin = origin;
            self.send.phase = Phase::Start;
            self.send.return_state = self.attach;
            self.send.start_deadline = now + start_timeout;
            self.send.resends = 0;
        }
    }
}
