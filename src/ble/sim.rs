//! In-memory stand-ins for the radio, the flash store and the clock.
//!
//! Used by the host tests and for bench runs without hardware. Every
//! collaborator call is counted so tests can check that nothing leaked and
//! that refused operations never reached the radio.

use core::cell::{Cell, Ref, RefCell};

use crate::address::PeerAddress;
use crate::ble::session::{SessionEvent, SessionObserver};
use crate::ble::{Central, ScanReport};
use crate::codec::Payload;
use crate::config::NAME_CAPACITY;
use crate::error::{CommandError, ConnectError, ScanError, StorageError};
use crate::storage::{KvStore, StorageKey};
use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

const MAX_SIM_PEERS: usize = 24;
const MAX_SIM_WRITES: usize = 32;
const MAX_SIM_EVENTS: usize = 32;

/// A simulated peripheral.
#[derive(Clone, Debug)]
pub struct SimPeer {
    pub address: PeerAddress,
    pub name: &'static str,
    pub rssi: i8,
    /// Whether the peer accepts connections.
    pub accepts: bool,
    pub has_service: bool,
    pub has_characteristic: bool,
    /// Whether the characteristic advertises write support.
    pub writable: bool,
}

impl SimPeer {
    /// A well-behaved relay board.
    pub fn relay_board(address: PeerAddress, name: &'static str) -> Self {
        Self {
            address,
            name,
            rssi: -60,
            accepts: true,
            has_service: true,
            has_characteristic: true,
            writable: true,
        }
    }

    pub fn refusing(mut self) -> Self {
        self.accepts = false;
        self
    }

    pub fn without_service(mut self) -> Self {
        self.has_service = false;
        self
    }

    pub fn without_characteristic(mut self) -> Self {
        self.has_characteristic = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    fn advertisement(&self) -> ([u8; NAME_CAPACITY + 2], usize) {
        let mut data = [0u8; NAME_CAPACITY + 2];
        let name = self.name.as_bytes();
        let n = name.len().min(NAME_CAPACITY);
        if n == 0 {
            // Flags only.
            data[..3].copy_from_slice(&[0x02, 0x01, 0x06]);
            return (data, 3);
        }
        data[0] = n as u8 + 1;
        data[1] = 0x09;
        data[2..2 + n].copy_from_slice(&name[..n]);
        (data, n + 2)
    }
}

/// Link handed out by [`SimCentral::connect`].
#[derive(Debug)]
pub struct SimLink {
    id: u32,
    address: PeerAddress,
}

/// Characteristic handed out by [`SimCentral::resolve`].
#[derive(Debug)]
pub struct SimChannel {
    writable: bool,
}

/// Simulated radio.
#[derive(Default)]
pub struct SimCentral {
    peers: RefCell<Vec<SimPeer, MAX_SIM_PEERS>>,
    scan_calls: Cell<usize>,
    connect_calls: Cell<usize>,
    open_links: Cell<usize>,
    next_link: Cell<u32>,
    live_link: Cell<Option<u32>>,
    radio_fails: Cell<bool>,
    writes_fail: Cell<bool>,
    write_attempts: Cell<usize>,
    written: RefCell<Vec<Payload, MAX_SIM_WRITES>>,
}

impl SimCentral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers(peers: &[SimPeer]) -> Self {
        let central = Self::new();
        for peer in peers {
            central.add_peer(peer.clone());
        }
        central
    }

    pub fn add_peer(&self, peer: SimPeer) {
        let _ = self.peers.borrow_mut().push(peer);
    }

    /// Make scans fail at the radio level.
    pub fn set_radio_fails(&self, fails: bool) {
        self.radio_fails.set(fails);
    }

    /// Make every write fail while keeping the link up.
    pub fn set_writes_fail(&self, fails: bool) {
        self.writes_fail.set(fails);
    }

    /// Simulate the peer vanishing without a disconnect.
    pub fn drop_link(&self) {
        self.live_link.set(None);
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.get()
    }

    /// Number of connection attempts that reached the radio.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.get()
    }

    /// Links handed out and not yet released.
    pub fn open_links(&self) -> usize {
        self.open_links.get()
    }

    /// Writes attempted, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.get()
    }

    /// Payloads that reached the peer, oldest first.
    pub fn written(&self) -> Ref<'_, [Payload]> {
        Ref::map(self.written.borrow(), |w| w.as_slice())
    }

    /// How many delivered payloads equal `data`.
    pub fn count_written(&self, data: &[u8]) -> usize {
        self.written
            .borrow()
            .iter()
            .filter(|w| w.as_slice() == data)
            .count()
    }

    fn peer(&self, address: &PeerAddress) -> Option<SimPeer> {
        self.peers
            .borrow()
            .iter()
            .find(|p| p.address == *address)
            .cloned()
    }
}

impl Central for SimCentral {
    type Link = SimLink;
    type Channel = SimChannel;

    async fn scan<F>(&self, _duration_secs: u64, mut on_report: F) -> Result<(), ScanError>
    where
        F: FnMut(ScanReport<'_>) -> Option<()>,
    {
        self.scan_calls.set(self.scan_calls.get() + 1);
        // Let other tasks run, as a real scan window would.
        yield_now().await;

        if self.radio_fails.get() {
            return Err(ScanError::RadioFailed);
        }

        let peers = self.peers.borrow().clone();
        for peer in peers.iter() {
            let (data, len) = peer.advertisement();
            let report = ScanReport {
                address: peer.address,
                rssi: peer.rssi,
                data: &data[..len],
            };
            if on_report(report).is_some() {
                break;
            }
        }
        Ok(())
    }

    async fn connect(&self, address: &PeerAddress) -> Result<SimLink, ConnectError> {
        self.connect_calls.set(self.connect_calls.get() + 1);
        match self.peer(address) {
            Some(peer) if peer.accepts => {
                let id = self.next_link.get() + 1;
                self.next_link.set(id);
                self.open_links.set(self.open_links.get() + 1);
                self.live_link.set(Some(id));
                Ok(SimLink {
                    id,
                    address: *address,
                })
            }
            _ => Err(ConnectError::LinkFailed),
        }
    }

    async fn resolve(&self, link: &SimLink) -> Result<SimChannel, ConnectError> {
        let peer = self.peer(&link.address).ok_or(ConnectError::ServiceMissing)?;
        if !peer.has_service {
            return Err(ConnectError::ServiceMissing);
        }
        if !peer.has_characteristic {
            return Err(ConnectError::CharacteristicMissing);
        }
        Ok(SimChannel {
            writable: peer.writable,
        })
    }

    fn can_write(&self, channel: &SimChannel) -> bool {
        channel.writable
    }

    async fn write(
        &self,
        link: &SimLink,
        _channel: &SimChannel,
        data: &[u8],
    ) -> Result<(), CommandError> {
        self.write_attempts.set(self.write_attempts.get() + 1);
        if !self.is_connected(link) || self.writes_fail.get() {
            return Err(CommandError::WriteFailed);
        }
        let payload = Payload::from_slice(data).map_err(|_| CommandError::WriteFailed)?;
        let _ = self.written.borrow_mut().push(payload);
        Ok(())
    }

    fn is_connected(&self, link: &SimLink) -> bool {
        self.live_link.get() == Some(link.id)
    }

    fn release(&self, link: SimLink) {
        self.open_links.set(self.open_links.get().saturating_sub(1));
        if self.live_link.get() == Some(link.id) {
            self.live_link.set(None);
        }
    }
}

/// Key-value store kept in RAM.
pub struct MemoryStore {
    entries: Vec<(StorageKey, Vec<u8, 32>), 3>,
    available: Cell<bool>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            available: Cell::new(true),
            writes: 0,
        }
    }

    /// Simulate a missing or broken storage partition.
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    /// Seed a value without counting it as a write.
    pub fn insert(&mut self, key: StorageKey, value: &[u8]) {
        let Ok(value) = Vec::from_slice(value) else {
            return;
        };
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => {
                let _ = self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: StorageKey) -> Option<Vec<u8, 32>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    async fn read(
        &mut self,
        key: StorageKey,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StorageError> {
        if !self.available.get() {
            return Err(StorageError::Unavailable);
        }
        Ok(self.get(key).map(|value| {
            let n = value.len().min(buf.len());
            buf[..n].copy_from_slice(&value[..n]);
            value.len()
        }))
    }

    async fn write(&mut self, key: StorageKey, value: &[u8]) -> Result<(), StorageError> {
        if !self.available.get() {
            return Err(StorageError::Unavailable);
        }
        self.insert(key, value);
        self.writes += 1;
        Ok(())
    }
}

/// Delay that returns immediately, keeping a tally of requested time.
#[derive(Default)]
pub struct SimDelay {
    elapsed_ns: u64,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns += u64::from(ms) * 1_000_000;
    }
}

/// Observer recording session events in order.
#[derive(Default)]
pub struct EventLog {
    events: Vec<SessionEvent, MAX_SIM_EVENTS>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SessionObserver for EventLog {
    fn on_event(&mut self, event: &SessionEvent) {
        let _ = self.events.push(event.clone());
    }
}
