//! Operations the presentation layer calls into.
//!
//! `Panel` owns the radio, the registry, the scanner and the session manager
//! and exposes them as one set of operations: scan and select, connect to the
//! selection or a trusted slot, designate trusted peers, toggle relays, and
//! report session status. It never formats display strings.

use core::cell::Ref;

use crate::address::PeerAddress;
use crate::ble::scanner::Scanner;
use crate::ble::session::{SessionManager, SessionObserver, SessionState};
use crate::ble::{Central, PeerCandidate, PeerInfo, PeerName};
use crate::codec::{self, Relay, StatusToken};
use crate::config::{BLE_SCAN_DURATION_SECS, BOOT_SETTLE_MS, RELAY_COUNT};
use crate::error::Error;
use crate::storage::{KvStore, PeerRegistry, TrustSlot};
use embedded_hal_async::delay::DelayNs;

/// Requests from the presentation layer, for channel-driven main loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelCommand {
    StartScan,
    Select(usize),
    ConnectSelected,
    ConnectTrusted(TrustSlot),
    Disconnect,
    DesignateTrusted { slot: TrustSlot, index: usize },
    SetAutoConnect(bool),
    SetRelay(Relay, bool),
    ToggleRelay(Relay),
}

/// What the presentation layer shows about the session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionStatus {
    pub connected: bool,
    pub state: SessionState,
    /// Empty when not connected.
    pub peer_name: PeerName,
    pub peer_address: Option<PeerAddress>,
    /// Trusted slot the connected peer is stored in, if any.
    pub trusted_slot: Option<TrustSlot>,
}

pub struct Panel<C: Central, S, D, O = ()> {
    central: C,
    delay: D,
    registry: PeerRegistry<S>,
    scanner: Scanner,
    session: SessionManager<C, O>,
    selected: Option<usize>,
    relays: [bool; RELAY_COUNT],
}

impl<C, S, D, O> Panel<C, S, D, O>
where
    C: Central,
    S: KvStore,
    D: DelayNs,
    O: SessionObserver,
{
    pub fn new(central: C, store: S, delay: D, observer: O) -> Self {
        Self {
            central,
            delay,
            registry: PeerRegistry::new(store),
            scanner: Scanner::new(),
            session: SessionManager::with_observer(observer),
            selected: None,
            relays: [false; RELAY_COUNT],
        }
    }

    /// Load the registry and, if enabled, auto-connect to the Primary slot
    /// once. Returns whether a session was established.
    pub async fn boot(&mut self) -> Result<bool, Error> {
        let snapshot = self.registry.load().await;
        if !snapshot.auto_connect {
            info!("Auto-connect disabled");
            return Ok(false);
        }
        if !snapshot.primary.is_set() {
            info!("Auto-connect skipped: Primary not set");
            return Ok(false);
        }

        self.delay.delay_ms(BOOT_SETTLE_MS).await;
        self.connect_trusted(TrustSlot::Primary).await?;
        Ok(true)
    }

    /// Run a scan, replacing the candidate list and clearing the selection.
    pub async fn start_scan(&mut self) -> Result<usize, Error> {
        self.selected = None;
        let found = self
            .scanner
            .scan(&self.central, &self.registry, BLE_SCAN_DURATION_SECS)
            .await?;
        Ok(found)
    }

    pub fn candidates(&self) -> Ref<'_, [PeerCandidate]> {
        self.scanner.candidates()
    }

    pub fn select_candidate(&mut self, index: usize) -> Result<PeerCandidate, Error> {
        let candidate = self.scanner.candidate(index).ok_or(Error::InvalidSelection)?;
        info!("Selected {}: {}", index, candidate.name.as_str());
        self.selected = Some(index);
        Ok(candidate)
    }

    pub fn selected(&self) -> Option<PeerCandidate> {
        self.selected.and_then(|i| self.scanner.candidate(i))
    }

    pub async fn connect_to_selected(&mut self) -> Result<(), Error> {
        let candidate = self.selected().ok_or(Error::NothingSelected)?;
        let peer = PeerInfo {
            address: candidate.address,
            name: candidate.name,
        };
        self.session
            .connect(&self.central, &mut self.delay, peer, StatusToken::Connected)
            .await?;
        Ok(())
    }

    pub async fn connect_trusted(&mut self, slot: TrustSlot) -> Result<(), Error> {
        let trusted = self.registry.trusted(slot);
        self.session
            .auto_connect(&self.central, &mut self.delay, slot, trusted)
            .await?;
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect(&self.central).await;
    }

    /// Store candidate `index` in `slot`.
    pub async fn designate_trusted(&mut self, slot: TrustSlot, index: usize) -> Result<(), Error> {
        let candidate = self.scanner.candidate(index).ok_or(Error::InvalidSelection)?;
        let saved = self
            .registry
            .set_trusted(slot, candidate.address, candidate.name.as_str())
            .await;
        self.scanner.refresh_trust(&self.registry);
        saved?;
        info!("Stored as {}: {}", slot, candidate.name.as_str());
        Ok(())
    }

    /// Store an address typed in as `XX:XX:XX:XX:XX:XX` in `slot`, for
    /// provisioning a peer that is not in range.
    pub async fn set_trusted_address(&mut self, slot: TrustSlot, text: &str) -> Result<(), Error> {
        let address: PeerAddress = text.parse()?;
        let saved = self
            .registry
            .set_trusted(slot, address, slot.display_name())
            .await;
        self.scanner.refresh_trust(&self.registry);
        saved?;
        Ok(())
    }

    pub async fn set_auto_connect(&mut self, enabled: bool) -> Result<(), Error> {
        self.registry.set_auto_connect(enabled).await?;
        Ok(())
    }

    pub fn session_status(&self) -> SessionStatus {
        match self.session.peer() {
            Some(peer) => SessionStatus {
                connected: true,
                state: self.session.state(),
                peer_name: peer.name.clone(),
                peer_address: Some(peer.address),
                trusted_slot: self.registry.slot_for(&peer.address),
            },
            None => SessionStatus {
                connected: false,
                state: self.session.state(),
                peer_name: PeerName::new(),
                peer_address: None,
                trusted_slot: None,
            },
        }
    }

    /// Switch a relay. The remembered state only changes once the frame
    /// was written.
    pub async fn set_relay(&mut self, relay: Relay, on: bool) -> Result<(), Error> {
        let frame = codec::encode_relay_command(relay, on);
        self.session.send_command(&self.central, &frame).await?;
        self.relays[relay.position()] = on;
        info!("Relay{}: {}", relay.number(), if on { "ON" } else { "OFF" });
        Ok(())
    }

    /// Flip a relay and return its new state.
    pub async fn toggle_relay(&mut self, relay: Relay) -> Result<bool, Error> {
        let on = !self.relay_state(relay);
        self.set_relay(relay, on).await?;
        Ok(on)
    }

    /// Last successfully commanded state of `relay`.
    pub fn relay_state(&self, relay: Relay) -> bool {
        self.relays[relay.position()]
    }

    /// Send an arbitrary payload given as hex digits.
    pub async fn send_hex(&mut self, hex: &str) -> Result<(), Error> {
        let payload = codec::encode_hex_string(hex)?;
        self.session.send_command(&self.central, &payload).await?;
        Ok(())
    }

    /// Periodic liveness tick. Returns `true` if the session was dropped.
    pub async fn check_liveness(&mut self) -> bool {
        self.session.check_liveness(&self.central).await
    }

    pub async fn handle(&mut self, command: PanelCommand) -> Result<(), Error> {
        debug!("Panel command: {}", command);
        match command {
            PanelCommand::StartScan => self.start_scan().await.map(drop),
            PanelCommand::Select(index) => self.select_candidate(index).map(drop),
            PanelCommand::ConnectSelected => self.connect_to_selected().await,
            PanelCommand::ConnectTrusted(slot) => self.connect_trusted(slot).await,
            PanelCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
            PanelCommand::DesignateTrusted { slot, index } => {
                self.designate_trusted(slot, index).await
            }
            PanelCommand::SetAutoConnect(enabled) => self.set_auto_connect(enabled).await,
            PanelCommand::SetRelay(relay, on) => self.set_relay(relay, on).await,
            PanelCommand::ToggleRelay(relay) => self.toggle_relay(relay).await.map(drop),
        }
    }

    pub fn registry(&self) -> &PeerRegistry<S> {
        &self.registry
    }

    pub fn session(&self) -> &SessionManager<C, O> {
        &self.session
    }

    pub fn central(&self) -> &C {
        &self.central
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}
