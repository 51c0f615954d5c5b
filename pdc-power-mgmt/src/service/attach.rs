//! Attach state machine
//!
//! Each attached state runs a setup sequence once per attach, one command per
//! step, and then settles in its RUN step where connector events, policy flags
//! and public commands are handled in that order.
use embassy_time::Instant;
use embedded_services::{debug, info, sync::Lockable, warn};
use pdc_interface::{
    Pdc, Pdo, PdoRequest, VdoOrigin,
    pdo::{FrsCurrent, PdoKind},
    ucsi::{PdoType, PowerOperationMode},
};

use super::{Port, Service};
use crate::{
    Error,
    arbitrator::ClaimReason,
    cci::CciFlags,
    command::{Command, PublicCommand},
    platform::{DualRoleCapability, Platform},
    policy::{SinkPolicy, SourcePolicy, UnattachedPolicy},
    port::{Attachment, ChargeLimit, InitStep, SinkStep, SourceStep, State, TypecStep},
};

/// Highest current a source port offers without a 3 A slot
const DEFAULT_SOURCE_CURRENT_MA: u32 = 1500;
/// Voltage of a Type-C only contract
const TYPEC_VOLTAGE_MV: u32 = 5000;

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    /// Move to another attach state, running exit and entry actions
    pub(super) fn transition(&self, port: &mut Port<'a, D>, next: State) {
        if port.ctx.attach == next {
            return;
        }

        self.exit_state(port);
        port.ctx.attach = next;
        self.enter_state(port);
        info!("Port{}: {}", port.id.0, next.name());
    }

    fn exit_state(&self, port: &mut Port<'a, D>) {
        let id = port.id;
        match port.ctx.attach {
            State::SnkAttached => {
                self.stop_charging(port);
                self.arbitrator.release(id, ClaimReason::Frs);
            }
            State::SnkTypecOnly => self.stop_charging(port),
            State::SrcAttached => self.arbitrator.release(id, ClaimReason::Sink),
            State::SrcTypecOnly => self.arbitrator.release(id, ClaimReason::NonPd),
            State::Init | State::Unattached | State::Suspended | State::SendCmdStart | State::SendCmdWait => {}
        }
    }

    fn enter_state(&self, port: &mut Port<'a, D>) {
        let attachment = match port.ctx.attach {
            State::SnkAttached => {
                port.ctx.sink_step = SinkStep::default();
                self.clear_sink_policy(port);
                Attachment::Sink
            }
            State::SrcAttached => {
                port.ctx.source_step = SourceStep::default();
                self.carry_source_policy(port);
                Attachment::Source
            }
            State::SnkTypecOnly => {
                port.ctx.typec_step = TypecStep::default();
                self.clear_sink_policy(port);
                Attachment::TypecOnly
            }
            State::SrcTypecOnly => {
                port.ctx.typec_step = TypecStep::default();
                self.carry_source_policy(port);
                Attachment::TypecOnly
            }
            State::Unattached => {
                self.arbitrator.release_all(port.id);
                port.shared.with(|data| data.status.clear_connection());
                Attachment::None
            }
            State::Init => {
                port.ctx.init_step = InitStep::default();
                Attachment::None
            }
            State::Suspended | State::SendCmdStart | State::SendCmdWait => Attachment::None,
        };
        port.shared.with(|data| data.status.attachment = attachment);
    }

    /// The setup sequence reads the active charge setting itself
    fn clear_sink_policy(&self, port: &Port<'a, D>) {
        port.shared
            .sink_policy
            .clear(SinkPolicy::ACTIVE_CHARGE | SinkPolicy::NEW_POWER_REQUEST);
    }

    /// A Type-C current change made while unattached still has to reach the PDC
    fn carry_source_policy(&self, port: &Port<'a, D>) {
        let shared = port.shared;
        if shared.unattached_policy.test_and_clear(UnattachedPolicy::TCC) {
            shared.source_policy.set(SourcePolicy::TCC);
        } else {
            shared.source_policy.clear(SourcePolicy::TCC);
        }
    }

    /// Pick the attach state from a freshly read connector status
    pub(super) fn decode_connector_status(&self, port: &mut Port<'a, D>) {
        let status = port.shared.with(|data| data.status.connector_status);

        if status.change.pd_reset_complete() {
            warn!("Port{}: PD reset complete", port.id.0);
            self.platform.notify_hard_reset(port.id);
        }

        let pd = status.power_operation_mode == PowerOperationMode::Pd;
        let next = match (status.connect_status, pd, status.power_direction) {
            (false, _, _) => State::Unattached,
            (true, true, true) => State::SrcAttached,
            (true, true, false) => State::SnkAttached,
            (true, false, true) => State::SrcTypecOnly,
            (true, false, false) => State::SnkTypecOnly,
        };

        if next != port.ctx.attach {
            self.transition(port, next);
        } else if next.is_attached() && status.change.connect_change() {
            // Detach and attach between two status reads
            info!("Port{}: reattached as {}", port.id.0, next.name());
            self.exit_state(port);
            self.enter_state(port);
        }

        port.shared
            .with(|data| data.status.pd_capable = status.connect_status && pd);
    }

    /// Re-read the connector status after a connector change
    fn check_event(&self, port: &mut Port<'a, D>) -> bool {
        if port.shared.cci.test_and_clear(CciFlags::EVENT) {
            self.queue_internal(port, Command::GetConnectorStatus);
            true
        } else {
            false
        }
    }

    /// Pick up a queued public command
    fn check_public(&self, port: &mut Port<'a, D>) {
        let Some(public) = port.shared.with(|data| data.public.take_queued()) else {
            return;
        };

        let command = public.command();
        if !command.is_connectionless() && !port.ctx.attach.is_attached() {
            debug!("Port{}: dropping {}, not connected", port.id.0, command.name());
            port.shared.abort_public(Error::Disconnected);
            return;
        }

        let args = &mut port.ctx.scratch;
        match public {
            PublicCommand::Reset | PublicCommand::GetVbusVoltage => {}
            PublicCommand::GetInfo => args.info_live = true,
            PublicCommand::ConnectorReset(reset) => args.connector_reset = reset,
            PublicCommand::SetUor(uor) => args.uor = uor,
            PublicCommand::SetPdr(pdr) => args.pdr = pdr,
            PublicCommand::SetRdo(rdo) => args.rdo = rdo,
        }

        debug!("Port{}: sending public {}", port.id.0, command.name());
        port.ctx
            .queue_public(command, Instant::now(), self.config.start_timeout);
    }

    /// Queue a setup command with the arguments from the policy settings
    fn queue_setup(&self, port: &mut Port<'a, D>, command: Command) {
        let settings = port.shared.with(|data| data.settings);
        let args = &mut port.ctx.scratch;
        match command {
            Command::SetUor => args.uor = settings.uor,
            Command::SetPdr => args.pdr = settings.pdr,
            Command::GetVdo => args.vdo_origin = VdoOrigin::Partner,
            _ => {}
        }
        self.queue_internal(port, command);
    }

    pub(super) async fn run_init(&self, port: &mut Port<'a, D>) {
        loop {
            match port.ctx.init_step {
                InitStep::WaitReady => {
                    let driver = port.driver;
                    if !driver.lock().await.is_init_done() {
                        return;
                    }
                    info!("Port{}: PDC ready", port.id.0);
                    port.ctx.init_step = InitStep::GetInfo;
                }
                InitStep::GetInfo => {
                    port.ctx.init_step = InitStep::GetCapability;
                    port.ctx.scratch.info_live = true;
                    self.queue_internal(port, Command::GetInfo);
                    return;
                }
                InitStep::GetCapability => {
                    port.ctx.init_step = InitStep::GetConnectorStatus;
                    self.queue_internal(port, Command::GetCapability);
                    return;
                }
                InitStep::GetConnectorStatus => {
                    self.queue_internal(port, Command::GetConnectorStatus);
                    return;
                }
            }
        }
    }

    pub(super) fn run_unattached(&self, port: &mut Port<'a, D>) {
        if self.check_event(port) {
            return;
        }

        let shared = port.shared;
        let settings = shared.with(|data| data.settings);
        if shared.unattached_policy.test_and_clear(UnattachedPolicy::CC_MODE) {
            port.ctx.scratch.ccom = settings.ccom;
            port.ctx.scratch.drp_mode = settings.drp_mode;
            self.queue_internal(port, Command::SetCcom);
        } else if shared.unattached_policy.test_and_clear(UnattachedPolicy::TCC) {
            port.ctx.scratch.typec_current = settings.typec_current;
            self.queue_internal(port, Command::SetPowerLevel);
        } else {
            self.check_public(port);
        }
    }

    pub(super) fn run_sink_attached(&self, port: &mut Port<'a, D>) {
        if self.check_event(port) {
            return;
        }

        loop {
            let (next, command) = match port.ctx.sink_step {
                SinkStep::GetConnectorCapability => (SinkStep::GetCableProperty, Command::GetConnectorCapability),
                SinkStep::GetCableProperty => (SinkStep::SetUor, Command::GetCableProperty),
                SinkStep::SetUor => (SinkStep::SetPdr, Command::SetUor),
                SinkStep::SetPdr => (SinkStep::IdentityDiscovery, Command::SetPdr),
                SinkStep::IdentityDiscovery => (SinkStep::GetVdo, Command::GetIdentityDiscovery),
                SinkStep::GetVdo => (SinkStep::ReadPowerLevel, Command::GetVdo),
                SinkStep::ReadPowerLevel => (SinkStep::GetSourcePdos, Command::ReadPowerLevel),
                SinkStep::GetSourcePdos => {
                    port.ctx.scratch.pdo_request = PdoRequest::partner(PdoType::Source);
                    (SinkStep::GetRdo, Command::GetPdos)
                }
                SinkStep::GetRdo => (SinkStep::GetSinkPdos, Command::GetRdo),
                SinkStep::GetSinkPdos => {
                    // Sink capabilities of a dual-role partner carry its FRS requirement
                    let dual_role = port
                        .shared
                        .with(|data| data.status.src_pdos.first().is_some_and(Pdo::dual_role_power));
                    if !dual_role {
                        port.shared.with(|data| data.status.snk_pdos.clear());
                        port.ctx.sink_step = SinkStep::Evaluate;
                        continue;
                    }
                    port.ctx.scratch.pdo_request = PdoRequest::partner(PdoType::Sink);
                    (SinkStep::Evaluate, Command::GetPdos)
                }
                SinkStep::Evaluate => {
                    self.evaluate_sink_contract(port);
                    let active = port.shared.with(|data| data.settings.active_charge);
                    port.ctx.sink_step = if active {
                        SinkStep::EnableSinkPath
                    } else {
                        SinkStep::Run
                    };
                    continue;
                }
                SinkStep::EnableSinkPath => {
                    port.ctx.scratch.sink_path = true;
                    (SinkStep::StartCharging, Command::SetSinkPath)
                }
                SinkStep::StartCharging => {
                    self.start_charging(port);
                    port.ctx.sink_step = SinkStep::Run;
                    continue;
                }
                SinkStep::Run => {
                    self.run_sink_policy(port);
                    return;
                }
            };

            port.ctx.sink_step = next;
            self.queue_setup(port, command);
            return;
        }
    }

    fn evaluate_sink_contract(&self, port: &mut Port<'a, D>) {
        let id = port.id;
        let (frs_3a, pdo, charge) = port.shared.with(|data| {
            let status = &mut data.status;
            let frs_3a = status
                .snk_pdos
                .first()
                .is_some_and(|pdo| pdo.frs_current() == FrsCurrent::Current3A0);
            let pdo = status
                .rdo
                .pdo_index()
                .and_then(|index| status.src_pdos.get(index).copied());

            status.pdo = pdo.unwrap_or_default();
            status.charge = pdo
                .map(|pdo| {
                    let current_ma = pdo.fixed_current_ma();
                    let voltage_mv = pdo.fixed_voltage_mv();
                    ChargeLimit {
                        current_ma,
                        voltage_mv,
                        power_mw: current_ma * voltage_mv / 1000,
                    }
                })
                .unwrap_or_default();
            (frs_3a, pdo, status.charge)
        });

        if frs_3a {
            self.arbitrator.request(id, ClaimReason::Frs);
        } else {
            self.arbitrator.release(id, ClaimReason::Frs);
        }

        match pdo {
            Some(pdo) => info!(
                "Port{}: PDO {:#x} selected, {}mV {}mA {}mW",
                id.0, pdo.0, charge.voltage_mv, charge.current_ma, charge.power_mw
            ),
            None => warn!("Port{}: RDO does not select a source PDO", id.0),
        }
    }

    fn start_charging(&self, port: &mut Port<'a, D>) {
        let id = port.id;
        let (enabled, pdo, charge) = port
            .shared
            .with(|data| (data.status.sink_path_enabled, data.status.pdo, data.status.charge));
        if !enabled {
            warn!("Port{}: sink path not enabled, not charging", id.0);
            return;
        }

        info!("Port{}: charging at {}mV {}mA", id.0, charge.voltage_mv, charge.current_ma);
        self.platform
            .set_input_current_limit(id, charge.current_ma, charge.voltage_mv);
        self.platform.set_charge_ceiling(id, Some(charge.current_ma));

        // Type-C only partners have no PDO and count as dedicated chargers
        let dedicated = (pdo.kind() == PdoKind::Fixed && (!pdo.dual_role_power() || pdo.unconstrained_power()))
            || charge.power_mw >= self.config.drp_charge_power_min_mw;
        self.platform.update_dual_role(
            id,
            if dedicated {
                DualRoleCapability::Dedicated
            } else {
                DualRoleCapability::DualRole
            },
        );
    }

    fn stop_charging(&self, port: &mut Port<'a, D>) {
        let id = port.id;
        self.platform.set_input_current_limit(id, 0, 0);
        self.platform.set_charge_ceiling(id, None);
        self.platform.update_dual_role(id, DualRoleCapability::Unknown);
        port.shared.with(|data| {
            data.status.pdo = Pdo::default();
            data.status.charge = ChargeLimit::default();
            data.status.sink_path_enabled = false;
        });
    }

    fn run_sink_policy(&self, port: &mut Port<'a, D>) {
        let shared = port.shared;
        if shared.sink_policy.test_and_clear(SinkPolicy::SWAP_TO_SRC) {
            if port.ctx.attach == State::SnkAttached {
                let mut pdr = shared.with(|data| data.settings.pdr);
                pdr.set_swap_to_src(true);
                pdr.set_swap_to_snk(false);
                port.ctx.scratch.pdr = pdr;
                self.queue_internal(port, Command::SetPdr);
                return;
            }
            debug!("Port{}: no PD contract, ignoring swap to source", port.id.0);
        }

        if shared.sink_policy.test_and_clear(SinkPolicy::ACTIVE_CHARGE) && self.update_active_charge(port) {
            return;
        }

        if shared.sink_policy.test_and_clear(SinkPolicy::NEW_POWER_REQUEST) {
            info!("Port{}: new power request", port.id.0);
        }

        self.check_public(port);
    }

    /// Follow an active charge port change, returns true if anything was started
    fn update_active_charge(&self, port: &mut Port<'a, D>) -> bool {
        let (active, enabled) = port
            .shared
            .with(|data| (data.settings.active_charge, data.status.sink_path_enabled));

        if active {
            info!("Port{}: selected as active charge port", port.id.0);
            if port.ctx.attach == State::SnkAttached {
                // Sink path off dropped the PDOs, read them again
                port.ctx.sink_step = SinkStep::GetSourcePdos;
            } else {
                port.ctx.typec_step = TypecStep::Evaluate;
            }
            true
        } else if enabled {
            info!("Port{}: no longer active charge port", port.id.0);
            port.ctx.scratch.sink_path = false;
            self.queue_internal(port, Command::SetSinkPath);
            true
        } else {
            false
        }
    }

    pub(super) fn run_source_attached(&self, port: &mut Port<'a, D>) {
        if self.check_event(port) {
            return;
        }

        let (next, command) = match port.ctx.source_step {
            SourceStep::GetConnectorCapability => (SourceStep::GetCableProperty, Command::GetConnectorCapability),
            SourceStep::GetCableProperty => (SourceStep::SetUor, Command::GetCableProperty),
            SourceStep::SetUor => (SourceStep::SetPdr, Command::SetUor),
            SourceStep::SetPdr => (SourceStep::IdentityDiscovery, Command::SetPdr),
            SourceStep::IdentityDiscovery => (SourceStep::GetVdo, Command::GetIdentityDiscovery),
            SourceStep::GetVdo => (SourceStep::GetSinkPdos, Command::GetVdo),
            SourceStep::GetSinkPdos => {
                port.ctx.scratch.pdo_request = PdoRequest::partner(PdoType::Sink);
                (SourceStep::Evaluate, Command::GetPdos)
            }
            SourceStep::Evaluate => {
                self.evaluate_sink_partner(port);
                port.ctx.source_step = SourceStep::Run;
                return;
            }
            SourceStep::Run => {
                self.run_source_policy(port);
                return;
            }
        };

        port.ctx.source_step = next;
        self.queue_setup(port, command);
    }

    /// Request a 3 A slot for sink partners that want more than the default current
    fn evaluate_sink_partner(&self, port: &mut Port<'a, D>) {
        let max_ma = port.shared.with(|data| {
            data.status
                .snk_pdos
                .iter()
                .filter(|pdo| pdo.kind() == PdoKind::Fixed)
                .map(Pdo::fixed_current_ma)
                .max()
                .unwrap_or(0)
        });

        if max_ma > DEFAULT_SOURCE_CURRENT_MA {
            info!("Port{}: sink partner requests {}mA", port.id.0, max_ma);
            self.arbitrator.request(port.id, ClaimReason::Sink);
        } else {
            self.arbitrator.release(port.id, ClaimReason::Sink);
        }
    }

    fn run_source_policy(&self, port: &mut Port<'a, D>) {
        let shared = port.shared;
        if shared.source_policy.test_and_clear(SourcePolicy::SWAP_TO_SNK) {
            if port.ctx.attach == State::SrcAttached {
                let mut pdr = shared.with(|data| data.settings.pdr);
                pdr.set_swap_to_snk(true);
                pdr.set_swap_to_src(false);
                port.ctx.scratch.pdr = pdr;
                self.queue_internal(port, Command::SetPdr);
                return;
            }
            debug!("Port{}: no PD contract, ignoring swap to sink", port.id.0);
        }

        if shared.source_policy.test_and_clear(SourcePolicy::TCC) {
            port.ctx.scratch.typec_current = shared.with(|data| data.settings.typec_current);
            self.queue_internal(port, Command::SetPowerLevel);
            return;
        }

        self.check_public(port);
    }

    pub(super) fn run_typec_sink(&self, port: &mut Port<'a, D>) {
        if self.check_event(port) {
            return;
        }

        loop {
            match port.ctx.typec_step {
                TypecStep::GetConnectorCapability => {
                    port.ctx.typec_step = TypecStep::Evaluate;
                    self.queue_internal(port, Command::GetConnectorCapability);
                    return;
                }
                TypecStep::Evaluate => {
                    let active = port.shared.with(|data| {
                        let current_ma = u32::from(data.status.connector_status.power_operation_mode.typec_current_ma());
                        data.status.charge = ChargeLimit {
                            current_ma,
                            voltage_mv: TYPEC_VOLTAGE_MV,
                            power_mw: current_ma * TYPEC_VOLTAGE_MV / 1000,
                        };
                        data.settings.active_charge
                    });
                    port.ctx.typec_step = if active {
                        TypecStep::EnableSinkPath
                    } else {
                        TypecStep::Run
                    };
                }
                TypecStep::EnableSinkPath => {
                    port.ctx.typec_step = TypecStep::StartCharging;
                    port.ctx.scratch.sink_path = true;
                    self.queue_internal(port, Command::SetSinkPath);
                    return;
                }
                TypecStep::StartCharging => {
                    self.start_charging(port);
                    port.ctx.typec_step = TypecStep::Run;
                }
                TypecStep::Run => {
                    self.run_sink_policy(port);
                    return;
                }
            }
        }
    }

    pub(super) fn run_typec_source(&self, port: &mut Port<'a, D>) {
        if self.check_event(port) {
            return;
        }

        match port.ctx.typec_step {
            TypecStep::GetConnectorCapability => {
                port.ctx.typec_step = TypecStep::Evaluate;
                self.queue_internal(port, Command::GetConnectorCapability);
            }
            TypecStep::Evaluate => {
                self.arbitrator.request(port.id, ClaimReason::NonPd);
                port.ctx.typec_step = TypecStep::Run;
            }
            // Sink side only
            TypecStep::EnableSinkPath | TypecStep::StartCharging => port.ctx.typec_step = TypecStep::Run,
            TypecStep::Run => self.run_source_policy(port),
        }
    }
}
