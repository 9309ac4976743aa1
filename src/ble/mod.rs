//! Bluetooth Low Energy subsystem.
//!
//! The controller runs in **Central** role against a relay board:
//!
//! 1. **Scanner** - discovers nearby peripherals and annotates each with
//!    the trusted slot it matches, if any.
//! 2. **Session** - owns the single active connection: dials the peer,
//!    resolves the relay service/characteristic, writes frames, and tears
//!    the link down again.
//!
//! Both drive the radio through the [`Central`] trait; the firmware
//! implements it over the SoftDevice, [`sim::SimCentral`] over an in-memory
//! model for host runs and tests.

pub mod adv_parser;
pub mod scanner;
pub mod session;
pub mod sim;

#[cfg(test)]
mod tests;

use crate::address::PeerAddress;
use crate::config::NAME_CAPACITY;
use crate::error::{CommandError, ConnectError, ScanError};
use crate::storage::TrustSlot;
use heapless::String;

/// Peer names, truncated to `NAME_CAPACITY` bytes.
pub type PeerName = String<NAME_CAPACITY>;

/// Copy `name` into a `PeerName`, dropping whatever does not fit.
pub fn peer_name(name: &str) -> PeerName {
    let mut n = PeerName::new();
    for c in name.chars() {
        if n.push(c).is_err() {
            break;
        }
    }
    n
}

/// One advertisement as delivered by the radio during a scan.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport<'a> {
    pub address: PeerAddress,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    /// Raw advertisement / scan-response data.
    pub data: &'a [u8],
}

/// A peer found by the last scan.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerCandidate {
    pub name: PeerName,
    pub address: PeerAddress,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    /// Trusted slot whose stored address equals this candidate's.
    pub trusted_slot: Option<TrustSlot>,
}

/// Name and address of the peer a session is (or was) bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerInfo {
    pub address: PeerAddress,
    pub name: PeerName,
}

impl PeerInfo {
    pub fn new(address: PeerAddress, name: &str) -> Self {
        Self {
            address,
            name: peer_name(name),
        }
    }
}

/// The radio, as seen by the scanner and the session manager.
///
/// All calls happen on one cooperative executor; nothing here needs `Send`.
#[allow(async_fn_in_trait)]
pub trait Central {
    /// An established transport link.
    type Link;
    /// The resolved relay characteristic on a link.
    type Channel;

    /// Scan for `duration_secs`, handing each peer to `on_report` once per
    /// scan. Returning `Some(())` from `on_report` ends the scan early.
    async fn scan<F>(&self, duration_secs: u64, on_report: F) -> Result<(), ScanError>
    where
        F: FnMut(ScanReport<'_>) -> Option<()>;

    /// Dial `address`. Blocks until the radio reports success or failure.
    async fn connect(&self, address: &PeerAddress) -> Result<Self::Link, ConnectError>;

    /// Find the relay service and its write characteristic on `link`.
    /// Fails with `ServiceMissing` or `CharacteristicMissing`.
    async fn resolve(&self, link: &Self::Link) -> Result<Self::Channel, ConnectError>;

    /// Whether the characteristic advertises write support.
    fn can_write(&self, channel: &Self::Channel) -> bool;

    async fn write(
        &self,
        link: &Self::Link,
        channel: &Self::Channel,
        data: &[u8],
    ) -> Result<(), CommandError>;

    /// Whether the radio still considers `link` connected.
    fn is_connected(&self, link: &Self::Link) -> bool;

    /// Disconnect if needed and free the link.
    fn release(&self, link: Self::Link);
}
