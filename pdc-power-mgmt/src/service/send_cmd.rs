//! Send-command sub-machine
//!
//! START dispatches the selected request until the driver accepts it or the
//! start budget runs out. WAIT watches the latched CCI bits: BUSY keeps
//! waiting, ERROR resends up to the resend bound and silence past the wait
//! budget fails the command. Every terminal path goes through
//! `exit_command`.
use embassy_time::Instant;
use embedded_services::{debug, error, sync::Lockable, trace, warn};
use pdc_interface::{Pdc, Response, ucsi::PdoType};

use super::{Port, Service, dispatch::DispatchError};
use crate::{
    Error,
    cci::CciFlags,
    command::Command,
    platform::Platform,
    port::{
        SinkStep, State,
        context::{Origin, Phase},
    },
};

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    pub(super) async fn send_cmd_start(&self, port: &mut Port<'a, D>) {
        let command = port.ctx.send.active().command;
        let mut stale = CciFlags::BUSY | CciFlags::ERROR | CciFlags::COMMAND_COMPLETED;
        if command == Command::Reset {
            stale |= CciFlags::RESET_COMPLETED;
        }
        port.shared.cci.clear(stale);

        let result = {
            let driver = port.driver;
            let mut pdc = driver.lock().await;
            self.dispatch(port, &mut *pdc, command)
        };

        match result {
            Ok(()) => {
                trace!("Port{}: {} started", port.id.0, command.name());
                port.ctx.send.phase = Phase::Wait;
                port.ctx.send.wait_deadline = Instant::now() + self.config.wait_timeout;
            }
            Err(DispatchError::NoCommand) => {
                error!("Port{}: no command to send", port.id.0);
                self.fail_command(port, Error::Failed);
            }
            Err(DispatchError::Driver(e)) => {
                if Instant::now() >= port.ctx.send.start_deadline {
                    error!("Port{}: unable to start {}: {:?}", port.id.0, command.name(), e);
                    self.fail_command(port, Error::Failed);
                } else {
                    debug!("Port{}: {} not started, retrying: {:?}", port.id.0, command.name(), e);
                }
            }
        }
    }

    pub(super) async fn send_cmd_wait(&self, port: &mut Port<'a, D>) {
        let shared = port.shared;
        let cci = &shared.cci;
        let command = port.ctx.send.active().command;

        if command == Command::Reset && cci.test_and_clear(CciFlags::RESET_COMPLETED) {
            self.complete_command(port).await;
        } else if cci.test_and_clear(CciFlags::BUSY) {
            trace!("Port{}: {} busy", port.id.0, command.name());
        } else if cci.test_and_clear(CciFlags::ERROR) {
            cci.clear(CciFlags::COMMAND_COMPLETED);
            let bound = if command.is_role_swap() {
                self.config.max_swap_resends
            } else {
                self.config.max_resends
            };

            if port.ctx.send.resends < bound {
                port.ctx.send.resends += 1;
                warn!(
                    "Port{}: {} failed, resending {}/{}",
                    port.id.0,
                    command.name(),
                    port.ctx.send.resends,
                    bound
                );
                port.ctx.send.phase = Phase::Start;
                port.ctx.send.start_deadline = Instant::now() + self.config.start_timeout;
            } else {
                error!("Port{}: {} failed", port.id.0, command.name());
                self.fail_command(port, Error::Failed);

                // Find out why, unless a reset is already on its way
                if command != Command::GetErrorStatus && port.ctx.send.select().is_none() {
                    self.queue_internal(port, Command::GetErrorStatus);
                }
            }
        } else if command != Command::Reset && cci.test_and_clear(CciFlags::COMMAND_COMPLETED) {
            self.complete_command(port).await;
        } else if Instant::now() >= port.ctx.send.wait_deadline {
            error!("Port{}: {} timed out", port.id.0, command.name());
            self.fail_command(port, Error::Timeout);
        }
    }

    async fn complete_command(&self, port: &mut Port<'a, D>) {
        let command = port.ctx.send.active().command;
        debug!("Port{}: {} complete", port.id.0, command.name());

        let (response, vconn) = {
            let driver = port.driver;
            let mut pdc = driver.lock().await;
            let response = pdc.take_response();
            let vconn = (command == Command::GetConnectorStatus).then(|| pdc.is_vconn_sourcing());
            (response, vconn)
        };
        self.store_response(port, command, response, vconn);

        if command == Command::Reset {
            debug!("Port{}: PDC reset, rearming unattached policies", port.id.0);
            port.shared.arm_unattached_policy();
            port.shared.cci.set(CciFlags::EVENT);
        }

        self.exit_command(port, Ok(()));

        match command {
            Command::GetConnectorStatus => self.decode_connector_status(port),
            Command::GetErrorStatus => {
                let error_status = port.shared.with(|data| data.status.error_status);
                warn!("Port{}: error status {:?}", port.id.0, error_status);
            }
            // The source answers a new request with a new contract, read it back
            Command::SetRdo if port.ctx.attach == State::SnkAttached => port.ctx.sink_step = SinkStep::GetRdo,
            _ => {}
        }
    }

    fn store_response(&self, port: &Port<'a, D>, command: Command, response: Option<Response>, vconn: Option<bool>) {
        let args = port.ctx.scratch;
        port.shared.with(|data| {
            let status = &mut data.status;
            match response {
                Some(Response::Capability(capability)) => status.capability = capability,
                Some(Response::ConnectorCapability(capability)) => status.connector_capability = capability,
                Some(Response::ConnectorStatus(connector_status)) => status.connector_status = connector_status,
                Some(Response::ErrorStatus(error_status)) => status.error_status = error_status,
                Some(Response::VbusVoltage(mv)) => {
                    status.vbus_mv = mv;
                    status.vbus_timestamp = Some(Instant::now());
                }
                Some(Response::Pdos(mut pdos)) => {
                    // Augmented PDOs always follow the fixed ones, removing them keeps RDO positions valid
                    pdos.retain(|pdo| !pdo.is_augmented());
                    match args.pdo_request.pdo_type {
                        PdoType::Source => status.src_pdos = pdos,
                        PdoType::Sink => status.snk_pdos = pdos,
                    }
                }
                Some(Response::Rdo(rdo)) => status.rdo = rdo,
                Some(Response::Info(info)) => status.info = info,
                Some(Response::CableProperty(cable)) => status.cable = cable,
                Some(Response::Vdos(vdos)) => status.vdos = vdos,
                Some(Response::IdentityDiscovery(discovery)) => status.discovery = discovery,
                None => {}
            }

            if let Some(vconn) = vconn {
                status.vconn_sourcing = vconn;
            }

            if command == Command::SetSinkPath {
                status.sink_path_enabled = args.sink_path;
            }
        });
    }

    /// Leave the send-command sub-machine, back to the state it was entered from
    fn exit_command(&self, port: &mut Port<'a, D>, result: Result<(), Error>) {
        port.shared.cci.clear(CciFlags::COMMAND_COMPLETED);

        let origin = port.ctx.send.origin;
        let request = port.ctx.send.active_mut();
        request.pending = false;
        request.error = result.is_err();
        port.ctx.send.phase = Phase::Idle;
        port.ctx.attach = port.ctx.send.return_state;

        if origin == Origin::Public {
            port.shared.with(|data| data.public.finish(result));
        }
    }

    fn fail_command(&self, port: &mut Port<'a, D>, error: Error) {
        let command = port.ctx.send.active().command;
        let return_state = port.ctx.send.return_state;
        self.exit_command(port, Err(error));

        // A PDC that does not answer a status query is reset
        let silent = error == Error::Timeout;
        if command == Command::GetConnectorStatus && (silent || matches!(return_state, State::Init | State::Unattached)) {
            error!("Port{}: connector status unavailable, resetting PDC", port.id.0);
            self.transition(port, State::Unattached);
            self.queue_internal(port, Command::Reset);
        }
    }
}
