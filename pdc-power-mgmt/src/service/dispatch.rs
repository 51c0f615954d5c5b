//! Command dispatcher, one driver call per command
use embedded_services::{debug, sync::Lockable};
use pdc_interface::{Pdc, PdError};

use super::{Port, Service};
use crate::{command::Command, platform::Platform};

/// Reasons a command could not be started
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(super) enum DispatchError {
    /// Nothing to send
    NoCommand,
    /// Driver refused the command
    Driver(PdError),
}

impl From<PdError> for DispatchError {
    fn from(e: PdError) -> Self {
        DispatchError::Driver(e)
    }
}

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    /// Start the command with the arguments from the port scratch area
    pub(super) fn dispatch(&self, port: &Port<'a, D>, pdc: &mut D::Inner, command: Command) -> Result<(), DispatchError> {
        let args = &port.ctx.scratch;
        match command {
            Command::None => return Err(DispatchError::NoCommand),
            Command::Reset => pdc.reset(),
            Command::GetInfo => pdc.get_info(args.info_live),
            Command::ConnectorReset => pdc.connector_reset(args.connector_reset),
            Command::GetCapability => pdc.get_capability(),
            Command::GetConnectorCapability => pdc.get_connector_capability(),
            Command::SetCcom => pdc.set_ccom(args.ccom, args.drp_mode),
            Command::SetUor => pdc.set_uor(args.uor),
            Command::SetPdr => pdc.set_pdr(args.pdr),
            Command::SetSinkPath => {
                if !args.sink_path {
                    // Charge limits are dropped before the sink path goes away
                    debug!("Port{}: invalidating charge contract", port.id.0);
                    port.shared.with(|data| data.status.clear_charge());
                    self.platform.set_input_current_limit(port.id, 0, 0);
                    self.platform.set_charge_ceiling(port.id, None);
                }
                pdc.set_sink_path(args.sink_path)
            }
            Command::GetConnectorStatus => pdc.get_connector_status(),
            Command::GetErrorStatus => pdc.get_error_status(),
            Command::GetVbusVoltage => pdc.get_vbus_voltage(),
            Command::GetPdos => pdc.get_pdos(args.pdo_request),
            Command::GetRdo => pdc.get_rdo(),
            Command::SetRdo => pdc.set_rdo(args.rdo),
            Command::ReadPowerLevel => pdc.read_power_level(),
            Command::GetCableProperty => pdc.get_cable_property(),
            Command::GetVdo => pdc.get_vdo(args.vdo_origin),
            Command::GetIdentityDiscovery => pdc.get_identity_discovery(),
            Command::SetPowerLevel => pdc.set_power_level(args.typec_current),
        }?;

        Ok(())
    }
}
