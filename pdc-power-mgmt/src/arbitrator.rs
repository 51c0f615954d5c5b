//! Cross-port source current arbitration
//!
//! A limited number of ports may advertise 3 A as a source at the same time.
//! Ports request a slot for one of three reasons, in decreasing priority: a PD
//! sink partner that needs more than 1.5 A, a dual-role partner that needs
//! 3 A after a fast role swap, and a Type-C only sink partner. A port holds at
//! most one reason. [`SourceCurrentArbitrator::balance`] hands out the slots
//! and takes them back from lower priority holders when a higher priority
//! request cannot be served.
use embassy_sync::signal::Signal;
use embedded_services::{GlobalRawMutex, debug, info};
use heapless::Vec;
use portable_atomic::{AtomicU32, Ordering};

use crate::PortId;

/// Maximum number of ports supported by the arbitrator
pub const MAX_PORTS: usize = 32;

/// Reason for requesting a 3 A slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimReason {
    /// PD sink partner requesting more than 1.5 A
    Sink,
    /// Dual-role partner requiring 3 A after a fast role swap
    Frs,
    /// Type-C only sink partner
    NonPd,
}

/// Source current to apply to a port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    /// Advertise 3 A
    Granted,
    /// Return to the configured default
    Revoked,
}

/// Result of a balancing pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rebalance {
    /// Ports whose advertised current changes
    pub changes: Vec<(PortId, Slot), MAX_PORTS>,
    /// A slot was taken back, balance again after the rearm delay
    pub rearm: bool,
}

impl Rebalance {
    fn push(&mut self, port: u8, slot: Slot) {
        // Each port appears at most once per pass
        let _ = self.changes.push((PortId(port), slot));
    }
}

fn bit(port: PortId) -> u32 {
    1u32.checked_shl(port.0 as u32).unwrap_or(0)
}

fn lowest(mask: u32) -> Option<u8> {
    if mask == 0 { None } else { Some(mask.trailing_zeros() as u8) }
}

/// Iterate ports in a mask from the lowest number up
fn ports(mut mask: u32) -> impl Iterator<Item = u8> {
    core::iter::from_fn(move || {
        let port = lowest(mask)?;
        mask &= mask - 1;
        Some(port)
    })
}

/// Source current arbitrator shared by all ports
pub struct SourceCurrentArbitrator {
    sink: AtomicU32,
    frs: AtomicU32,
    non_pd: AtomicU32,
    claimed: AtomicU32,
    max_3a_ports: u8,
    pending: Signal<GlobalRawMutex, ()>,
}

impl SourceCurrentArbitrator {
    pub const fn new(max_3a_ports: u8) -> Self {
        Self {
            sink: AtomicU32::new(0),
            frs: AtomicU32::new(0),
            non_pd: AtomicU32::new(0),
            claimed: AtomicU32::new(0),
            max_3a_ports,
            pending: Signal::new(),
        }
    }

    fn mask(&self, reason: ClaimReason) -> &AtomicU32 {
        match reason {
            ClaimReason::Sink => &self.sink,
            ClaimReason::Frs => &self.frs,
            ClaimReason::NonPd => &self.non_pd,
        }
    }

    /// Request a slot, replacing any other reason held by the port
    pub fn request(&self, port: PortId, reason: ClaimReason) {
        debug!("Port{}: requesting 3 A slot for {:?}", port.0, reason);
        let bit = bit(port);
        for other in [ClaimReason::Sink, ClaimReason::Frs, ClaimReason::NonPd] {
            if other == reason {
                self.mask(other).fetch_or(bit, Ordering::AcqRel);
            } else {
                self.mask(other).fetch_and(!bit, Ordering::AcqRel);
            }
        }
        self.pending.signal(());
    }

    /// Drop the request of the port for the given reason
    pub fn release(&self, port: PortId, reason: ClaimReason) {
        let bit = bit(port);
        if self.mask(reason).fetch_and(!bit, Ordering::AcqRel) & bit != 0 {
            debug!("Port{}: releasing 3 A request for {:?}", port.0, reason);
            self.pending.signal(());
        }
    }

    /// Drop every request of the port
    pub fn release_all(&self, port: PortId) {
        for reason in [ClaimReason::Sink, ClaimReason::Frs, ClaimReason::NonPd] {
            self.release(port, reason);
        }
    }

    /// Returns true if the port currently holds a slot
    pub fn is_claimed(&self, port: PortId) -> bool {
        self.claimed.load(Ordering::Acquire) & bit(port) != 0
    }

    /// Wait until a request changed
    pub async fn wait_pending(&self) {
        self.pending.wait().await;
    }

    /// Hand out and take back slots
    ///
    /// Slots are granted on the next pass after a downgrade, never in the same
    /// pass, so the downgraded partner has time to lower its current draw.
    pub fn balance(&self) -> Rebalance {
        let mut result = Rebalance::default();
        let sink = self.sink.load(Ordering::Acquire);
        let frs = self.frs.load(Ordering::Acquire);
        let non_pd = self.non_pd.load(Ordering::Acquire);
        let mut claimed = self.claimed.load(Ordering::Acquire);

        // Release slots whose request went away
        let stale = claimed & !(sink | frs | non_pd);
        for port in ports(stale) {
            info!("Port{}: releasing 3 A slot", port);
            result.push(port, Slot::Revoked);
        }
        claimed &= !stale;

        let mut free = (self.max_3a_ports as u32).saturating_sub(claimed.count_ones());

        'balance: {
            for port in ports(sink & !claimed) {
                if free > 0 {
                    info!("Port{}: granting 3 A slot to sink", port);
                    claimed |= 1 << port;
                    free -= 1;
                    result.push(port, Slot::Granted);
                } else if let Some(victim) = lowest(claimed & non_pd).or(lowest(claimed & frs)) {
                    info!("Port{}: downgrading to make room for sink on port {}", victim, port);
                    claimed &= !(1 << victim);
                    result.push(victim, Slot::Revoked);
                    result.rearm = true;
                    break 'balance;
                }
            }

            for port in ports(frs & !claimed) {
                if free > 0 {
                    info!("Port{}: granting 3 A slot for FRS", port);
                    claimed |= 1 << port;
                    free -= 1;
                    result.push(port, Slot::Granted);
                } else if let Some(victim) = lowest(claimed & non_pd) {
                    info!("Port{}: downgrading to make room for FRS on port {}", victim, port);
                    claimed &= !(1 << victim);
                    result.push(victim, Slot::Revoked);
                    result.rearm = true;
                    break 'balance;
                }
            }

            for port in ports(non_pd & !claimed) {
                if free == 0 {
                    break;
                }
                info!("Port{}: granting 3 A slot to non-PD sink", port);
                claimed |= 1 << port;
                free -= 1;
                result.push(port, Slot::Granted);
            }
        }

        self.claimed.store(claimed, Ordering::Release);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(result: &Rebalance) -> &[(PortId, Slot)] {
        result.changes.as_slice()
    }

    #[test]
    fn test_single_slot_first_sink_wins() {
        let arbitrator = SourceCurrentArbitrator::new(1);
        arbitrator.request(PortId(0), ClaimReason::Sink);
        assert_eq!(changes(&arbitrator.balance()), &[(PortId(0), Slot::Granted)]);

        arbitrator.request(PortId(1), ClaimReason::Sink);
        let result = arbitrator.balance();
        assert!(result.changes.is_empty());
        assert!(!result.rearm);
        assert!(arbitrator.is_claimed(PortId(0)));
        assert!(!arbitrator.is_claimed(PortId(1)));

        // Slot moves once the first port lets go
        arbitrator.release(PortId(0), ClaimReason::Sink);
        assert_eq!(
            changes(&arbitrator.balance()),
            &[(PortId(0), Slot::Revoked), (PortId(1), Slot::Granted)]
        );
    }

    #[test]
    fn test_sink_preempts_non_pd() {
        let arbitrator = SourceCurrentArbitrator::new(1);
        arbitrator.request(PortId(2), ClaimReason::NonPd);
        assert_eq!(changes(&arbitrator.balance()), &[(PortId(2), Slot::Granted)]);

        arbitrator.request(PortId(0), ClaimReason::Sink);
        let result = arbitrator.balance();
        assert_eq!(changes(&result), &[(PortId(2), Slot::Revoked)]);
        assert!(result.rearm);

        // Freed slot is handed out on the next pass
        assert_eq!(changes(&arbitrator.balance()), &[(PortId(0), Slot::Granted)]);
        assert!(!arbitrator.is_claimed(PortId(2)));
    }

    #[test]
    fn test_frs_preempts_non_pd_only() {
        let arbitrator = SourceCurrentArbitrator::new(1);
        arbitrator.request(PortId(0), ClaimReason::Sink);
        arbitrator.balance();

        arbitrator.request(PortId(1), ClaimReason::Frs);
        let result = arbitrator.balance();
        assert!(result.changes.is_empty());
        assert!(!result.rearm);
        assert!(arbitrator.is_claimed(PortId(0)));
    }

    #[test]
    fn test_reason_replaced() {
        let arbitrator = SourceCurrentArbitrator::new(2);
        arbitrator.request(PortId(0), ClaimReason::NonPd);
        arbitrator.request(PortId(0), ClaimReason::Sink);
        arbitrator.balance();
        assert!(arbitrator.is_claimed(PortId(0)));

        // The non-PD reason was dropped when the sink reason replaced it
        arbitrator.release(PortId(0), ClaimReason::Sink);
        assert_eq!(changes(&arbitrator.balance()), &[(PortId(0), Slot::Revoked)]);
    }
}
