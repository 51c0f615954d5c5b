//! Public API
//!
//! Mutators queue one public command on the port and wait for the port task
//! to finish it. Queries read the cached status and never touch the PDC.
use embassy_time::{Instant, Timer};
use embedded_services::{debug, info, sync::Lockable, warn};
use heapless::Vec;
use pdc_interface::{
    MAX_PDOS, Pdc, PdcInfo, Pdo, PpmCapability, Rdo,
    ucsi::{CableProperty, Ccom, ConnectorPartnerType, ConnectorReset, ConnectorStatus, ErrorStatus},
};

use super::Service;
use crate::{
    Error, PortId,
    command::PublicCommand,
    platform::Platform,
    policy::{CommsRequest, DualRoleState, SinkPolicy, SourcePolicy, UnattachedPolicy},
    port::{Attachment, PortShared, PortStatus, State},
};

/// Power role of a port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    Sink,
    Source,
}

/// CC line used by the connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    Cc1,
    Cc2,
}

/// Data role of a port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRole {
    Disconnected,
    Ufp,
    Dfp,
}

/// What the CC lines see
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcState {
    None,
    DfpAttached,
    UfpAttached,
    UfpDebugAccessory,
    UfpAudioAccessory,
}

fn is_connected(shared: &PortShared) -> bool {
    shared.with(|data| data.status.attachment != Attachment::None)
}

fn withdraw_public(shared: &PortShared) {
    shared.with(|data| data.public.give_up());
}

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    /// Queue a public command and wait for its result
    async fn public_api_block(&self, id: PortId, command: PublicCommand) -> Result<(), Error> {
        let shared = self.shared(id)?;
        if matches!(shared.attach_state(), State::Init | State::Suspended) {
            return Err(Error::NotReady);
        }

        let needs_connection = !command.command().is_connectionless();
        if needs_connection && !is_connected(shared) {
            return Err(Error::Disconnected);
        }

        shared.with(|data| data.public.claim(command))?;
        debug!("Port{}: public {} queued", id.0, command.command().name());
        shared.wake.signal(());

        let deadline = Instant::now() + self.config.public_timeout;
        loop {
            if let Some(result) = shared.with(|data| data.public.take_result()) {
                return result;
            }

            if needs_connection && !is_connected(shared) {
                warn!("Port{}: disconnected during {}", id.0, command.command().name());
                withdraw_public(shared);
                return Err(Error::Disconnected);
            }

            if Instant::now() >= deadline {
                warn!("Port{}: {} timed out", id.0, command.command().name());
                withdraw_public(shared);
                return Err(Error::Timeout);
            }

            Timer::after(self.config.public_poll).await;
        }
    }

    /// Run `f` on the cached status of a connected port, `default` otherwise
    fn connected_or<R>(&self, id: PortId, default: R, f: impl FnOnce(&PortStatus) -> R) -> Result<R, Error> {
        let shared = self.shared(id)?;
        Ok(shared.with(|data| {
            if data.status.attachment == Attachment::None {
                default
            } else {
                f(&data.status)
            }
        }))
    }

    pub fn is_connected(&self, id: PortId) -> Result<bool, Error> {
        self.shared(id).map(is_connected)
    }

    pub fn get_power_role(&self, id: PortId) -> Result<PowerRole, Error> {
        self.connected_or(id, PowerRole::Sink, |status| {
            if status.connector_status.power_direction {
                PowerRole::Source
            } else {
                PowerRole::Sink
            }
        })
    }

    /// CC polarity, `None` while disconnected
    pub fn pd_get_polarity(&self, id: PortId) -> Result<Option<Polarity>, Error> {
        self.connected_or(id, None, |status| {
            Some(if status.connector_status.orientation {
                Polarity::Cc2
            } else {
                Polarity::Cc1
            })
        })
    }

    pub fn pd_get_data_role(&self, id: PortId) -> Result<DataRole, Error> {
        self.connected_or(id, DataRole::Disconnected, |status| {
            if status.connector_status.partner_type == ConnectorPartnerType::DfpAttached {
                DataRole::Ufp
            } else {
                DataRole::Dfp
            }
        })
    }

    pub fn get_task_cc_state(&self, id: PortId) -> Result<CcState, Error> {
        self.connected_or(id, CcState::None, |status| match status.connector_status.partner_type {
            ConnectorPartnerType::DfpAttached => CcState::DfpAttached,
            ConnectorPartnerType::UfpAttached | ConnectorPartnerType::PoweredCableUfp => CcState::UfpAttached,
            ConnectorPartnerType::DebugAccessory => CcState::UfpDebugAccessory,
            ConnectorPartnerType::AudioAccessory => CcState::UfpAudioAccessory,
            ConnectorPartnerType::Reserved | ConnectorPartnerType::PoweredCableNoUfp => CcState::None,
        })
    }

    pub fn pd_capable(&self, id: PortId) -> Result<bool, Error> {
        self.connected_or(id, false, |status| status.pd_capable)
    }

    /// VBUS voltage in mV, 0 while disconnected
    ///
    /// Readings younger than the configured cache lifetime are returned
    /// without asking the PDC.
    pub async fn get_vbus_voltage(&self, id: PortId) -> Result<u32, Error> {
        let shared = self.shared(id)?;
        if !is_connected(shared) {
            return Ok(0);
        }

        let lifetime = self.config.vbus_cache;
        let cached = shared.with(|data| {
            data.status
                .vbus_timestamp
                .filter(|timestamp| Instant::now() < *timestamp + lifetime)
                .map(|_| data.status.vbus_mv)
        });
        if let Some(mv) = cached {
            return Ok(mv);
        }

        self.public_api_block(id, PublicCommand::GetVbusVoltage).await?;
        Ok(shared.with(|data| data.status.vbus_mv))
    }

    /// Source capabilities of the partner, empty unless attached as a PD sink
    pub fn get_src_caps(&self, id: PortId) -> Result<Vec<Pdo, MAX_PDOS>, Error> {
        let shared = self.shared(id)?;
        if shared.attach_state() != State::SnkAttached {
            return Ok(Vec::new());
        }
        Ok(shared.with(|data| data.status.src_pdos.clone()))
    }

    pub fn get_src_cap_cnt(&self, id: PortId) -> Result<usize, Error> {
        self.get_src_caps(id).map(|pdos| pdos.len())
    }

    pub fn get_task_state(&self, id: PortId) -> Result<State, Error> {
        self.shared(id).map(PortShared::state)
    }

    pub fn get_task_state_name(&self, id: PortId) -> Result<&'static str, Error> {
        self.get_task_state(id).map(State::name)
    }

    /// False while PDC communication is suspended
    pub fn comm_is_enabled(&self, id: PortId) -> Result<bool, Error> {
        self.shared(id)
            .map(|shared| shared.attach_state() != State::Suspended)
    }

    pub fn get_vconn_state(&self, id: PortId) -> Result<bool, Error> {
        self.connected_or(id, false, |status| status.vconn_sourcing)
    }

    pub fn get_partner_usb_comm_capable(&self, id: PortId) -> Result<bool, Error> {
        self.connected_or(id, false, |status| {
            let caps = status.connector_capability;
            caps.usb2() || caps.usb3() || caps.usb4_gen2() || caps.usb4_gen3() || caps.usb4_gen4()
        })
    }

    /// Partner is a sink-connected source with unconstrained power
    pub fn get_partner_unconstr_power(&self, id: PortId) -> Result<bool, Error> {
        let shared = self.shared(id)?;
        if shared.attach_state() != State::SnkAttached {
            return Ok(false);
        }
        Ok(shared.with(|data| data.status.pdo.unconstrained_power()))
    }

    /// Partner advertises dual-role power in its first PDO
    pub fn get_partner_dual_role_power(&self, id: PortId) -> Result<bool, Error> {
        self.connected_or(id, false, |status| {
            let pdos = match status.attachment {
                Attachment::Sink => &status.src_pdos,
                Attachment::Source => &status.snk_pdos,
                Attachment::None | Attachment::TypecOnly => return false,
            };
            pdos.first().is_some_and(Pdo::dual_role_power)
        })
    }

    pub fn get_partner_data_swap_capable(&self, id: PortId) -> Result<bool, Error> {
        self.connected_or(id, false, |status| {
            let caps = status.connector_capability;
            (caps.drp() || caps.rp_only() || caps.rd_only()) && (caps.swap_to_dfp() || caps.swap_to_ufp())
        })
    }

    pub fn get_usb_pd_port_count(&self) -> u8 {
        // Bounded by MAX_PORTS at construction
        u8::try_from(self.ports.len()).unwrap_or(u8::MAX)
    }

    /// Chip info read at init, see [`Service::get_info`] for a fresh copy
    pub fn get_chip_info(&self, id: PortId) -> Result<PdcInfo, Error> {
        self.shared(id).map(|shared| shared.with(|data| data.status.info))
    }

    pub fn get_connector_status(&self, id: PortId) -> Result<ConnectorStatus, Error> {
        self.shared(id)
            .map(|shared| shared.with(|data| data.status.connector_status))
    }

    pub fn get_cable_property(&self, id: PortId) -> Result<CableProperty, Error> {
        self.connected_or(id, CableProperty::default(), |status| status.cable)
    }

    /// PPM capability read at init
    pub fn get_ppm_capability(&self, id: PortId) -> Result<PpmCapability, Error> {
        self.shared(id).map(|shared| shared.with(|data| data.status.capability))
    }

    /// Error status read after the last command the PDC failed
    pub fn get_error_status(&self, id: PortId) -> Result<ErrorStatus, Error> {
        self.shared(id).map(|shared| shared.with(|data| data.status.error_status))
    }

    /// Read the chip info from the PDC
    pub async fn get_info(&self, id: PortId) -> Result<PdcInfo, Error> {
        self.public_api_block(id, PublicCommand::GetInfo).await?;
        self.get_chip_info(id)
    }

    /// Reset the PDC
    pub async fn reset(&self, id: PortId) -> Result<(), Error> {
        info!("Port{}: PDC reset requested", id.0);
        self.public_api_block(id, PublicCommand::Reset).await
    }

    pub async fn connector_reset(&self, id: PortId, reset: ConnectorReset) -> Result<(), Error> {
        info!("Port{}: connector reset requested", id.0);
        self.public_api_block(id, PublicCommand::ConnectorReset(reset)).await
    }

    async fn request_power_role(&self, id: PortId, role: PowerRole) -> Result<(), Error> {
        let mut pdr = self.shared(id)?.with(|data| data.settings.pdr);
        pdr.set_swap_to_src(role == PowerRole::Source);
        pdr.set_swap_to_snk(role == PowerRole::Sink);
        self.public_api_block(id, PublicCommand::SetPdr(pdr)).await
    }

    pub async fn request_swap_to_src(&self, id: PortId) -> Result<(), Error> {
        self.request_power_role(id, PowerRole::Source).await
    }

    pub async fn request_swap_to_snk(&self, id: PortId) -> Result<(), Error> {
        self.request_power_role(id, PowerRole::Sink).await
    }

    /// Swap to the other power role, nothing to do unless PD attached
    pub async fn request_power_swap(&self, id: PortId) -> Result<(), Error> {
        match self.shared(id)?.attach_state() {
            State::SnkAttached => self.request_power_role(id, PowerRole::Source).await,
            State::SrcAttached => self.request_power_role(id, PowerRole::Sink).await,
            _ => Ok(()),
        }
    }

    async fn request_data_role(&self, id: PortId, role: DataRole) -> Result<(), Error> {
        let mut uor = self.shared(id)?.with(|data| data.settings.uor);
        uor.set_swap_to_ufp(role == DataRole::Ufp);
        uor.set_swap_to_dfp(role == DataRole::Dfp);
        self.public_api_block(id, PublicCommand::SetUor(uor)).await
    }

    pub async fn request_swap_to_ufp(&self, id: PortId) -> Result<(), Error> {
        self.request_data_role(id, DataRole::Ufp).await
    }

    pub async fn request_swap_to_dfp(&self, id: PortId) -> Result<(), Error> {
        self.request_data_role(id, DataRole::Dfp).await
    }

    /// Swap to the other data role, nothing to do while disconnected
    pub async fn request_data_swap(&self, id: PortId) -> Result<(), Error> {
        match self.pd_get_data_role(id)? {
            DataRole::Dfp => self.request_data_role(id, DataRole::Ufp).await,
            DataRole::Ufp => self.request_data_role(id, DataRole::Dfp).await,
            DataRole::Disconnected => Ok(()),
        }
    }

    /// Accept or reject data role swaps requested by the partner
    pub async fn accept_data_swap(&self, id: PortId, accept: bool) -> Result<(), Error> {
        let uor = self.shared(id)?.with(|data| {
            data.settings.uor.set_accept_dr_swap(accept);
            data.settings.uor
        });
        self.public_api_block(id, PublicCommand::SetUor(uor)).await
    }

    /// Accept or reject power role swaps requested by the partner
    pub async fn accept_power_swap(&self, id: PortId, accept: bool) -> Result<(), Error> {
        let pdr = self.shared(id)?.with(|data| {
            data.settings.pdr.set_accept_pr_swap(accept);
            data.settings.pdr
        });
        self.public_api_block(id, PublicCommand::SetPdr(pdr)).await
    }

    /// Select the port allowed to charge, `None` to stop charging from every port
    pub fn set_active_charge_port(&self, port: Option<PortId>) -> Result<(), Error> {
        if let Some(id) = port {
            self.shared(id)?;
        }

        for id in self.port_ids() {
            let shared = self.shared(id)?;
            let active = port == Some(id);
            let changed = shared.with(|data| {
                let changed = data.settings.active_charge != active;
                data.settings.active_charge = active;
                changed
            });

            if changed {
                debug!("Port{}: active charge {}", id.0, active);
                shared.sink_policy.set(SinkPolicy::ACTIVE_CHARGE);
                shared.wake.signal(());
            }
        }

        Ok(())
    }

    /// Request a new contract from the attached source
    ///
    /// Only a PD sink has a contract to change. The new contract is read back
    /// and charging follows it once the PDC accepts the request.
    pub async fn request_rdo(&self, id: PortId, rdo: Rdo) -> Result<(), Error> {
        if self.shared(id)?.attach_state() != State::SnkAttached {
            debug!("Port{}: no PD contract to change", id.0);
            return Err(Error::Failed);
        }

        info!("Port{}: requesting RDO {:#x}", id.0, rdo.0);
        self.public_api_block(id, PublicCommand::SetRdo(rdo)).await
    }

    /// Flag a new power request on a sink port
    pub fn set_new_power_request(&self, id: PortId) -> Result<(), Error> {
        let shared = self.shared(id)?;
        if matches!(shared.attach_state(), State::SnkAttached | State::SnkTypecOnly) {
            shared.sink_policy.set(SinkPolicy::NEW_POWER_REQUEST);
            shared.wake.signal(());
        }
        Ok(())
    }

    pub fn set_dual_role(&self, id: PortId, state: DualRoleState) -> Result<(), Error> {
        let shared = self.shared(id)?;
        let attach = shared.attach_state();
        debug!("Port{}: dual role {:?}", id.0, state);

        match state {
            DualRoleState::ToggleOn => set_cc_mode(shared, Ccom::Drp),
            DualRoleState::ToggleOff => set_cc_mode(shared, Ccom::Rd),
            DualRoleState::Freeze => set_cc_mode(shared, if attach == State::SrcAttached { Ccom::Rp } else { Ccom::Rd }),
            DualRoleState::ForceSink => {
                if attach == State::SrcAttached {
                    shared.source_policy.set(SourcePolicy::SWAP_TO_SNK);
                }
            }
            DualRoleState::ForceSource => {
                if attach == State::SnkAttached {
                    shared.sink_policy.set(SinkPolicy::SWAP_TO_SRC);
                }
            }
        }

        shared.wake.signal(());
        Ok(())
    }

    /// Suspend or resume PDC communication on every port
    ///
    /// Waits until every port reached the requested state. Ports finish the
    /// command in flight before suspending.
    pub async fn set_comms_state(&self, enabled: bool) -> Result<(), Error> {
        info!("{} PDC communication", if enabled { "Resuming" } else { "Suspending" });
        for id in self.port_ids() {
            let shared = self.shared(id)?;
            if enabled {
                shared.comms.clear(CommsRequest::SUSPEND);
                shared.comms.set(CommsRequest::RESUME);
            } else {
                shared.comms.clear(CommsRequest::RESUME);
                shared.comms.set(CommsRequest::SUSPEND);
            }
            shared.wake.signal(());
        }

        let deadline = Instant::now() + self.config.public_timeout;
        loop {
            let mut done = true;
            for id in self.port_ids() {
                let suspended = self.shared(id)?.attach_state() == State::Suspended;
                done &= suspended != enabled;
            }

            if done {
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!("PDC communication state change timed out");
                return Err(Error::Timeout);
            }

            Timer::after(self.config.public_poll).await;
        }
    }
}

fn set_cc_mode(shared: &PortShared, ccom: Ccom) {
    shared.with(|data| data.settings.ccom = ccom);
    shared.unattached_policy.set(UnattachedPolicy::CC_MODE);
}
