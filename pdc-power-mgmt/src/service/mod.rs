//! PDC power management service
//!
//! The service owns no per-port storage itself. Ports are handed over as a
//! slice of [`PortRegistration`]s at boot, indexed by [`PortId`].
mod api;
mod attach;
mod dispatch;
mod hooks;
mod send_cmd;
mod task;

pub use api::{CcState, DataRole, Polarity, PowerRole};

use embassy_time::Instant;
use embedded_services::{debug, error, sync::Lockable};
use pdc_interface::Pdc;

use crate::{
    Error, PortId,
    arbitrator::{MAX_PORTS, SourceCurrentArbitrator},
    command::Command,
    config::{Config, PortConfig},
    platform::Platform,
    port::{PortRegistration, PortShared, context::PortContext},
};

/// A port as seen by its own task
pub(crate) struct Port<'a, D> {
    pub id: PortId,
    pub shared: &'a PortShared,
    pub driver: &'a D,
    pub config: PortConfig,
    pub ctx: PortContext,
}

/// PDC power management service
pub struct Service<'a, D: Lockable, P: Platform>
where
    D::Inner: Pdc,
{
    ports: &'a [PortRegistration<'a, D>],
    platform: &'a P,
    arbitrator: SourceCurrentArbitrator,
    config: Config,
}

impl<'a, D: Lockable, P: Platform> Service<'a, D, P>
where
    D::Inner: Pdc,
{
    /// Create the service, port `n` is `ports[n]`
    ///
    /// At most [`MAX_PORTS`] ports can be registered.
    pub fn new(ports: &'a [PortRegistration<'a, D>], platform: &'a P, config: Config) -> Result<Self, Error> {
        if ports.len() > MAX_PORTS {
            error!("{} ports registered, at most {} supported", ports.len(), MAX_PORTS);
            return Err(Error::TooManyPorts);
        }

        Ok(Self {
            ports,
            platform,
            arbitrator: SourceCurrentArbitrator::new(config.max_3a_ports),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Source current arbitrator shared by all ports
    pub fn arbitrator(&self) -> &SourceCurrentArbitrator {
        &self.arbitrator
    }

    fn registration(&self, id: PortId) -> Result<&PortRegistration<'a, D>, Error> {
        self.ports.get(id.index()).ok_or(Error::InvalidPort)
    }

    fn shared(&self, id: PortId) -> Result<&'a PortShared, Error> {
        self.registration(id).map(|registration| registration.shared)
    }

    fn port_ids(&self) -> impl Iterator<Item = PortId> {
        (0..self.ports.len()).map_while(|i| u8::try_from(i).ok().map(PortId))
    }

    /// Queue an internal command for the port task
    fn queue_internal(&self, port: &mut Port<'a, D>, command: Command) {
        debug!("Port{}: queueing {}", port.id.0, command.name());
        port.ctx
            .queue_internal(command, Instant::now(), self.config.start_timeout);
    }
}
