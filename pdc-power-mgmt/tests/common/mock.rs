#![allow(clippy::unwrap_used)]
use core::cell::RefCell;

use embassy_sync::{blocking_mutex, signal::Signal};
use embedded_services::{GlobalRawMutex, event::Sender, info};
use pdc_interface::{
    Cci, DiscoveryState, MAX_PDOS, Pdc, PdError, PdcInfo, Pdo, PdoRequest, PpmCapability, Rdo, Response, VdoOrigin,
    ucsi::{
        CableProperty, Ccom, ConnectorCapability, ConnectorReset, ConnectorStatus, DrpMode, ErrorStatus, PdoType, Pdr,
        TypeCCurrent, Uor,
    },
};
use pdc_power_mgmt::{DualRoleCapability, Platform, PortId, cci::CciCallback};

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum FnCall {
    Reset,
    ConnectorReset(ConnectorReset),
    GetCapability,
    GetConnectorCapability,
    SetCcom(Ccom, DrpMode),
    SetUor(Uor),
    SetPdr(Pdr),
    SetSinkPath(bool),
    GetConnectorStatus,
    GetErrorStatus,
    GetVbusVoltage,
    GetPdos(PdoRequest),
    GetRdo,
    SetRdo(Rdo),
    ReadPowerLevel,
    GetInfo(bool),
    SetPowerLevel(TypeCCurrent),
    GetCableProperty,
    GetVdo(VdoOrigin),
    GetIdentityDiscovery,
    SetCommsState(bool),
}

/// How the mock answers a started command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Reply {
    /// COMMAND_COMPLETED, or RESET_COMPLETED for a reset
    Complete,
    /// ERROR
    Error,
    /// Nothing, ever
    Silent,
    /// Nothing until [`MockPdc::complete`]
    Hold,
}

pub struct MockPdc {
    name: &'static str,
    callback: CciCallback<'static>,
    fn_call: &'static Signal<GlobalRawMutex, (usize, FnCall)>,
    response: Option<Response>,
    replies: Vec<(fn(&FnCall) -> bool, Reply)>,
    refusals: Option<(fn(&FnCall) -> bool, usize)>,
    /// Number of commands refused with `PdError::Busy`
    pub refused: usize,
    /// Every command started so far
    pub calls: Vec<FnCall>,
    pub init_done: bool,
    pub vconn: bool,
    pub connector_status: ConnectorStatus,
    pub connector_capability: ConnectorCapability,
    pub src_pdos: heapless::Vec<Pdo, MAX_PDOS>,
    pub snk_pdos: heapless::Vec<Pdo, MAX_PDOS>,
    pub rdo: Rdo,
    pub vbus_mv: u32,
    pub info: PdcInfo,
}

#[allow(dead_code)]
impl MockPdc {
    pub fn new(
        name: &'static str,
        callback: CciCallback<'static>,
        fn_call: &'static Signal<GlobalRawMutex, (usize, FnCall)>,
    ) -> Self {
        Self {
            name,
            callback,
            fn_call,
            response: None,
            replies: Vec::new(),
            refusals: None,
            refused: 0,
            calls: Vec::new(),
            init_done: true,
            vconn: false,
            connector_status: ConnectorStatus::default(),
            connector_capability: ConnectorCapability::default(),
            src_pdos: heapless::Vec::new(),
            snk_pdos: heapless::Vec::new(),
            rdo: Rdo::default(),
            vbus_mv: 0,
            info: PdcInfo::default(),
        }
    }

    /// Answer commands matching `filter` with `reply`, later rules take precedence
    pub fn set_reply(&mut self, filter: fn(&FnCall) -> bool, reply: Reply) {
        self.replies.push((filter, reply));
    }

    pub fn clear_replies(&mut self) {
        self.replies.clear();
    }

    /// Refuse the next `count` commands matching `filter` before they start
    pub fn refuse(&mut self, filter: fn(&FnCall) -> bool, count: usize) {
        self.refusals = Some((filter, count));
    }

    /// Number of started commands matching `filter`
    pub fn count(&self, filter: impl Fn(&FnCall) -> bool) -> usize {
        self.calls.iter().filter(|call| filter(call)).count()
    }

    /// Complete a held command
    pub fn complete(&self) {
        self.send_cci(Cci::COMMAND_COMPLETED);
    }

    /// Report a CCI the way a driver does, through the event sender
    fn send_cci(&self, cci: Cci) {
        let mut callback = self.callback;
        assert_eq!(callback.try_send(cci), Some(()));
    }

    /// Report a connector change with a new connector status
    pub fn simulate_connector_change(&mut self, status: ConnectorStatus) {
        info!("{}: connector change", self.name);
        self.connector_status = status;
        let mut cci = Cci(0);
        cci.set_connector_change(1);
        self.send_cci(cci);
    }

    fn record_fn_call(&mut self, fn_call: FnCall) {
        let num_fn_calls = self
            .fn_call
            .try_take()
            .map(|(num_fn_calls, _)| num_fn_calls)
            .unwrap_or(0);
        self.fn_call.signal((num_fn_calls + 1, fn_call.clone()));
        self.calls.push(fn_call);
    }

    fn start(&mut self, fn_call: FnCall, response: Option<Response>) -> Result<(), PdError> {
        if let Some((filter, remaining)) = self.refusals.as_mut()
            && *remaining > 0
            && filter(&fn_call)
        {
            *remaining -= 1;
            self.refused += 1;
            info!("{}: {:?} refused", self.name, fn_call);
            return Err(PdError::Busy);
        }

        info!("{}: {:?}", self.name, fn_call);
        let reply = self
            .replies
            .iter()
            .rev()
            .find(|(filter, _)| filter(&fn_call))
            .map(|(_, reply)| *reply)
            .unwrap_or(Reply::Complete);
        let reset = fn_call == FnCall::Reset;
        self.record_fn_call(fn_call);
        self.response = response;

        match reply {
            Reply::Complete if reset => self.send_cci(Cci::RESET_COMPLETED),
            Reply::Complete => self.send_cci(Cci::COMMAND_COMPLETED),
            Reply::Error => self.send_cci(Cci::ERROR | Cci::COMMAND_COMPLETED),
            Reply::Silent | Reply::Hold => {}
        }
        Ok(())
    }
}

impl Pdc for MockPdc {
    fn is_init_done(&mut self) -> bool {
        self.init_done
    }

    fn reset(&mut self) -> Result<(), PdError> {
        self.start(FnCall::Reset, None)
    }

    fn connector_reset(&mut self, reset: ConnectorReset) -> Result<(), PdError> {
        self.start(FnCall::ConnectorReset(reset), None)
    }

    fn get_capability(&mut self) -> Result<(), PdError> {
        self.start(
            FnCall::GetCapability,
            Some(Response::Capability(PpmCapability {
                num_connectors: 1,
                ..Default::default()
            })),
        )
    }

    fn get_connector_capability(&mut self) -> Result<(), PdError> {
        let capability = self.connector_capability;
        self.start(
            FnCall::GetConnectorCapability,
            Some(Response::ConnectorCapability(capability)),
        )
    }

    fn set_ccom(&mut self, ccom: Ccom, drp_mode: DrpMode) -> Result<(), PdError> {
        self.start(FnCall::SetCcom(ccom, drp_mode), None)
    }

    fn set_uor(&mut self, uor: Uor) -> Result<(), PdError> {
        self.start(FnCall::SetUor(uor), None)
    }

    fn set_pdr(&mut self, pdr: Pdr) -> Result<(), PdError> {
        self.start(FnCall::SetPdr(pdr), None)
    }

    fn set_sink_path(&mut self, enable: bool) -> Result<(), PdError> {
        self.start(FnCall::SetSinkPath(enable), None)
    }

    fn get_connector_status(&mut self) -> Result<(), PdError> {
        let status = self.connector_status;
        self.start(FnCall::GetConnectorStatus, Some(Response::ConnectorStatus(status)))
    }

    fn get_error_status(&mut self) -> Result<(), PdError> {
        self.start(
            FnCall::GetErrorStatus,
            Some(Response::ErrorStatus(ErrorStatus::default())),
        )
    }

    fn get_vbus_voltage(&mut self) -> Result<(), PdError> {
        let mv = self.vbus_mv;
        self.start(FnCall::GetVbusVoltage, Some(Response::VbusVoltage(mv)))
    }

    fn get_pdos(&mut self, request: PdoRequest) -> Result<(), PdError> {
        let pdos = match request.pdo_type {
            PdoType::Source => self.src_pdos.clone(),
            PdoType::Sink => self.snk_pdos.clone(),
        };
        self.start(FnCall::GetPdos(request), Some(Response::Pdos(pdos)))
    }

    fn get_rdo(&mut self) -> Result<(), PdError> {
        let rdo = self.rdo;
        self.start(FnCall::GetRdo, Some(Response::Rdo(rdo)))
    }

    fn set_rdo(&mut self, rdo: Rdo) -> Result<(), PdError> {
        self.start(FnCall::SetRdo(rdo), None)
    }

    fn read_power_level(&mut self) -> Result<(), PdError> {
        self.start(FnCall::ReadPowerLevel, None)
    }

    fn get_info(&mut self, live: bool) -> Result<(), PdError> {
        let info = self.info;
        self.start(FnCall::GetInfo(live), Some(Response::Info(info)))
    }

    fn set_power_level(&mut self, current: TypeCCurrent) -> Result<(), PdError> {
        self.start(FnCall::SetPowerLevel(current), None)
    }

    fn get_cable_property(&mut self) -> Result<(), PdError> {
        self.start(
            FnCall::GetCableProperty,
            Some(Response::CableProperty(CableProperty::default())),
        )
    }

    fn get_vdo(&mut self, origin: VdoOrigin) -> Result<(), PdError> {
        self.start(FnCall::GetVdo(origin), Some(Response::Vdos(heapless::Vec::new())))
    }

    fn get_identity_discovery(&mut self) -> Result<(), PdError> {
        self.start(
            FnCall::GetIdentityDiscovery,
            Some(Response::IdentityDiscovery(DiscoveryState::Complete)),
        )
    }

    fn set_comms_state(&mut self, enabled: bool) -> Result<(), PdError> {
        info!("{}: comms {}", self.name, enabled);
        self.record_fn_call(FnCall::SetCommsState(enabled));
        Ok(())
    }

    fn is_vconn_sourcing(&mut self) -> bool {
        self.vconn
    }

    fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum PlatformCall {
    InputCurrentLimit(PortId, u32, u32),
    ChargeCeiling(PortId, Option<u32>),
    DualRole(PortId, DualRoleCapability),
    HardReset(PortId),
}

pub struct MockPlatform {
    calls: blocking_mutex::Mutex<GlobalRawMutex, RefCell<Vec<PlatformCall>>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            calls: blocking_mutex::Mutex::new(RefCell::new(Vec::new())),
        }
    }
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock(|calls| calls.borrow().clone())
    }

    /// Last call matching `filter`
    pub fn last(&self, filter: impl Fn(&PlatformCall) -> bool) -> Option<PlatformCall> {
        self.calls().into_iter().rev().find(|call| filter(call))
    }

    fn record(&self, call: PlatformCall) {
        info!("Platform: {:?}", call);
        self.calls.lock(|calls| calls.borrow_mut().push(call));
    }
}

impl Platform for MockPlatform {
    fn set_input_current_limit(&self, port: PortId, current_ma: u32, voltage_mv: u32) {
        self.record(PlatformCall::InputCurrentLimit(port, current_ma, voltage_mv));
    }

    fn set_charge_ceiling(&self, port: PortId, ceiling_ma: Option<u32>) {
        self.record(PlatformCall::ChargeCeiling(port, ceiling_ma));
    }

    fn update_dual_role(&self, port: PortId, capability: DualRoleCapability) {
        self.record(PlatformCall::DualRole(port, capability));
    }

    fn notify_hard_reset(&self, port: PortId) {
        self.record(PlatformCall::HardReset(port));
    }
}
