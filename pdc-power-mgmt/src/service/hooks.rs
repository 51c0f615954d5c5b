//! Chipset power state hooks
use embedded_services::{debug, info, sync::Lockable};
use pdc_interface::Pdc;

use super::Service;
use crate::{
    Error,
    platform::Platform,
    policy::{DualRoleState, SinkPolicy},
    port::State,
};

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    fn set_dual_role_all(&self, state: DualRoleState) -> Result<(), Error> {
        for id in self.port_ids() {
            self.set_dual_role(id, state)?;
        }
        Ok(())
    }

    /// AP is starting, sink only until it is up
    pub fn on_chipset_startup(&self) -> Result<(), Error> {
        info!("Chipset startup");
        self.set_dual_role_all(DualRoleState::ToggleOff)
    }

    pub fn on_chipset_suspend(&self) -> Result<(), Error> {
        info!("Chipset suspend");
        self.set_dual_role_all(DualRoleState::ToggleOff)
    }

    /// AP is up, toggle again and take the source role from partners that would rather sink
    pub fn on_chipset_resume(&self) -> Result<(), Error> {
        info!("Chipset resume");
        self.set_dual_role_all(DualRoleState::ToggleOn)?;

        for id in self.port_ids() {
            let shared = self.shared(id)?;
            if shared.attach_state() != State::SnkAttached {
                continue;
            }

            let pdo = shared.with(|data| data.status.pdo);
            if pdo.dual_role_power() && !pdo.unconstrained_power() {
                debug!("Port{}: constrained dual-role partner, swapping to source", id.0);
                shared.sink_policy.set(SinkPolicy::SWAP_TO_SRC);
                shared.wake.signal(());
            }
        }

        Ok(())
    }

    pub fn on_chipset_shutdown(&self) -> Result<(), Error> {
        info!("Chipset shutdown");
        self.set_dual_role_all(DualRoleState::ForceSink)
    }
}
