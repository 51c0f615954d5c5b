//! Port and arbitrator loops
use embassy_futures::{select::select, yield_now};
use embassy_time::Timer;
use embedded_services::{error, info, sync::Lockable, trace};
use pdc_interface::{Pdc, ucsi::TypeCCurrent};

use super::{Port, Service};
use crate::{
    Error, PortId,
    arbitrator::Slot,
    platform::Platform,
    policy::{CommsRequest, SourcePolicy, UnattachedPolicy},
    port::{State, context::Phase, context::PortContext},
};

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    /// Run the state machine of one port
    ///
    /// Never returns for a registered port.
    pub async fn run_port(&self, id: PortId) {
        let Ok(registration) = self.registration(id) else {
            error!("Port{}: not registered", id.0);
            return;
        };

        info!("Port{}: starting PDC power management", id.0);
        let mut port = Port {
            id,
            shared: registration.shared,
            driver: registration.driver,
            config: registration.config,
            ctx: PortContext::new(),
        };
        port.shared.configure(&port.config);
        port.shared.reinitialize();

        loop {
            let before = port.ctx;
            self.step(&mut port).await;
            port.shared.publish_state(port.ctx.task_state(), port.ctx.attach);

            if port.ctx != before {
                if port.ctx.task_state() != before.task_state() {
                    trace!(
                        "Port{}: {} -> {}",
                        id.0,
                        before.task_state().name(),
                        port.ctx.task_state().name()
                    );
                }
                yield_now().await;
            } else {
                select(Timer::after(self.config.tick), port.shared.wake.wait()).await;
            }
        }
    }

    async fn step(&self, port: &mut Port<'a, D>) {
        match port.ctx.send.phase {
            Phase::Start => self.send_cmd_start(port).await,
            Phase::Wait => self.send_cmd_wait(port).await,
            Phase::Idle => {
                if self.process_comms_request(port).await {
                    return;
                }

                match port.ctx.attach {
                    State::Init => self.run_init(port).await,
                    State::Unattached => self.run_unattached(port),
                    State::SnkAttached => self.run_sink_attached(port),
                    State::SrcAttached => self.run_source_attached(port),
                    State::SnkTypecOnly => self.run_typec_sink(port),
                    State::SrcTypecOnly => self.run_typec_source(port),
                    // Suspended is handled by the comms barrier, send-command states are never attach states
                    State::Suspended | State::SendCmdStart | State::SendCmdWait => {}
                }
            }
        }
    }

    /// Suspend/resume barrier, returns true if the port is or just became suspended
    async fn process_comms_request(&self, port: &mut Port<'a, D>) -> bool {
        let comms = &port.shared.comms;
        if port.ctx.attach == State::Suspended {
            if comms.test_and_clear(CommsRequest::RESUME) {
                self.resume(port).await;
            }
            return true;
        }

        comms.clear(CommsRequest::RESUME);
        if comms.contains(CommsRequest::SUSPEND) && port.ctx.can_suspend() && comms.test_and_clear(CommsRequest::SUSPEND)
        {
            self.suspend(port).await;
            return true;
        }

        false
    }

    async fn suspend(&self, port: &mut Port<'a, D>) {
        info!("Port{}: suspending PDC communication", port.id.0);
        let driver = port.driver;
        if let Err(e) = driver.lock().await.set_comms_state(false) {
            error!("Port{}: failed to suspend PDC communication: {:?}", port.id.0, e);
        }

        self.transition(port, State::Suspended);
        port.shared.cci.clear_all();
        port.shared.with(|data| data.status.clear_connection());
        port.shared.abort_public(Error::NotReady);
    }

    async fn resume(&self, port: &mut Port<'a, D>) {
        info!("Port{}: resuming PDC communication", port.id.0);
        let driver = port.driver;
        if let Err(e) = driver.lock().await.set_comms_state(true) {
            error!("Port{}: failed to resume PDC communication: {:?}", port.id.0, e);
        }

        port.ctx = PortContext::new();
        port.shared.reinitialize();
    }

    /// Run the source current arbitrator
    pub async fn run_arbitrator(&self) {
        info!("Starting source current arbitrator");
        loop {
            self.arbitrator.wait_pending().await;
            loop {
                let rebalance = self.arbitrator.balance();
                for (id, slot) in rebalance.changes {
                    self.apply_source_current(id, slot);
                }

                if !rebalance.rearm {
                    break;
                }
                Timer::after(self.config.rearm_delay).await;
            }
        }
    }

    fn apply_source_current(&self, id: PortId, slot: Slot) {
        let Ok(registration) = self.registration(id) else {
            error!("Port{}: not registered", id.0);
            return;
        };

        let current = match slot {
            Slot::Granted => TypeCCurrent::Current3A0,
            Slot::Revoked => registration.config.typec_current,
        };
        info!("Port{}: source current {:?}", id.0, current);

        let shared = registration.shared;
        shared.with(|data| data.settings.typec_current = current);
        shared.unattached_policy.set(UnattachedPolicy::TCC);
        shared.source_policy.set(SourcePolicy::TCC);
        shared.wake.signal(());
    }
}
