//! CCI latch and the driver-facing callback
use bitflags::bitflags;
use embedded_services::{event::Sender, trace};
use pdc_interface::Cci;

use crate::port::PortShared;

bitflags! {
    /// CCI bits latched for the port task
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CciFlags: u32 {
        const RESET_COMPLETED = 1 << 0;
        const BUSY = 1 << 1;
        const ERROR = 1 << 2;
        const COMMAND_COMPLETED = 1 << 3;
        /// Connector change or vendor defined indicator, the connector status must be re-read
        const EVENT = 1 << 4;
    }
}

impl From<Cci> for CciFlags {
    fn from(cci: Cci) -> Self {
        let mut flags = CciFlags::empty();
        flags.set(CciFlags::RESET_COMPLETED, cci.reset_completed());
        flags.set(CciFlags::BUSY, cci.busy());
        flags.set(CciFlags::ERROR, cci.error());
        flags.set(CciFlags::COMMAND_COMPLETED, cci.command_completed());
        flags.set(
            CciFlags::EVENT,
            cci.vendor_defined_indicator() || cci.connector_change() != 0,
        );
        flags
    }
}

/// Handed to a PDC driver to report the CCI of its port
///
/// Latching is lock-free and never blocks, drivers may call it from any context.
#[derive(Copy, Clone)]
pub struct CciCallback<'a> {
    port: &'a PortShared,
}

impl<'a> CciCallback<'a> {
    pub fn new(port: &'a PortShared) -> Self {
        Self { port }
    }

    /// Latch the CCI bits and wake the port task
    pub fn notify(&self, cci: Cci) {
        let flags = CciFlags::from(cci);
        trace!("CCI {:#x} latched as {:#x}", cci.0, flags.bits());
        if !flags.is_empty() {
            self.port.cci.set(flags);
            self.port.wake.signal(());
        }
    }
}

impl Sender<Cci> for CciCallback<'_> {
    fn try_send(&mut self, event: Cci) -> Option<()> {
        self.notify(event);
        Some(())
    }

    fn send(&mut self, event: Cci) -> impl Future<Output = ()> {
        self.notify(event);
        core::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_cci() {
        assert_eq!(CciFlags::from(Cci::COMMAND_COMPLETED), CciFlags::COMMAND_COMPLETED);
        assert_eq!(
            CciFlags::from(Cci::COMMAND_COMPLETED | Cci::ERROR),
            CciFlags::COMMAND_COMPLETED | CciFlags::ERROR
        );
        assert_eq!(CciFlags::from(Cci::RESET_COMPLETED), CciFlags::RESET_COMPLETED);
        assert_eq!(CciFlags::from(Cci::VENDOR_DEFINED), CciFlags::EVENT);

        let mut cci = Cci(0);
        cci.set_connector_change(1);
        assert_eq!(CciFlags::from(cci), CciFlags::EVENT);
        assert!(CciFlags::from(Cci(0)).is_empty());
    }

    #[test]
    fn test_callback_latches() {
        let port = PortShared::new();
        let mut callback = CciCallback::new(&port);
        assert_eq!(callback.try_send(Cci::BUSY), Some(()));
        assert!(port.cci.contains(CciFlags::BUSY));
        assert!(port.wake.signaled());
    }
}
