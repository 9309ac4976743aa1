//! Single-session connection manager.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──link up──▶ ServiceResolving ──resolved──▶ Active
//!    ▲                    │                         │                         │
//!    └────── failure ─────┴─────────────────────────┘       disconnect / link lost
//!    └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no reconnecting state: a dropped session goes back to `Idle` and
//! a new session is always a fresh `connect`. The link and the resolved
//! characteristic live inside the `Session` value, so every exit path hands
//! the link back to [`Central::release`] exactly once.

use crate::ble::{Central, PeerInfo};
use crate::codec::{encode_text, StatusToken};
use crate::config::{CONFIRM_DELAY_MS, RECONNECT_SETTLE_MS};
use crate::error::{CommandError, ConnectError};
use crate::storage::{TrustSlot, TrustedPeer};
use embedded_hal_async::delay::DelayNs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No session.
    Idle,
    /// Transport link requested.
    Connecting,
    /// Link up, looking for the relay service and characteristic.
    ServiceResolving,
    /// Service and characteristic resolved; commands may be sent.
    Active,
}

/// Notifications for whoever renders the session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    StateChanged(SessionState),
    Connected(PeerInfo),
    Disconnected(PeerInfo),
    ConnectFailed(ConnectError),
}

/// Receives [`SessionEvent`]s as they happen.
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl SessionObserver for () {
    fn on_event(&mut self, _event: &SessionEvent) {}
}

struct Session<L, H> {
    peer: PeerInfo,
    link: L,
    channel: H,
}

/// Owns the one active session, if any.
pub struct SessionManager<C: Central, O = ()> {
    state: SessionState,
    session: Option<Session<C::Link, C::Channel>>,
    observer: O,
}

impl<C: Central> SessionManager<C, ()> {
    pub fn new() -> Self {
        Self::with_observer(())
    }
}

impl<C: Central> Default for SessionManager<C, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Central, O: SessionObserver> SessionManager<C, O> {
    pub fn with_observer(observer: O) -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            observer,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Peer of the active session.
    pub fn peer(&self) -> Option<&PeerInfo> {
        self.session.as_ref().map(|s| &s.peer)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Open a session to `peer` and announce it with `token`.
    ///
    /// An active session is torn down first. On failure every resource taken
    /// during the attempt is released and the manager is back in `Idle`.
    pub async fn connect<D: DelayNs>(
        &mut self,
        central: &C,
        delay: &mut D,
        peer: PeerInfo,
        token: StatusToken,
    ) -> Result<(), ConnectError> {
        if self.session.is_some() {
            self.disconnect(central).await;
            delay.delay_ms(RECONNECT_SETTLE_MS).await;
        }

        info!("Connecting to {} ({})", peer.name.as_str(), peer.address);
        self.set_state(SessionState::Connecting);

        let (link, channel) = match self.establish(central, &peer).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Connection to {} failed: {}", peer.address, e);
                self.set_state(SessionState::Idle);
                self.observer.on_event(&SessionEvent::ConnectFailed(e));
                return Err(e);
            }
        };

        if central.can_write(&channel) {
            debug!("Characteristic supports write operations");
        } else {
            warn!("Characteristic may not support write - writing anyway");
        }

        self.session = Some(Session {
            peer: peer.clone(),
            link,
            channel,
        });
        self.set_state(SessionState::Active);
        self.observer.on_event(&SessionEvent::Connected(peer));

        delay.delay_ms(CONFIRM_DELAY_MS).await;
        if let Err(e) = self.send_text(central, token.as_str()).await {
            warn!("Could not send {}: {}", token.as_str(), e);
        }

        info!("BLE connection successful");
        Ok(())
    }

    async fn establish(
        &mut self,
        central: &C,
        peer: &PeerInfo,
    ) -> Result<(C::Link, C::Channel), ConnectError> {
        let link = central.connect(&peer.address).await?;

        self.set_state(SessionState::ServiceResolving);
        match central.resolve(&link).await {
            Ok(channel) => Ok((link, channel)),
            Err(e) => {
                central.release(link);
                Err(e)
            }
        }
    }

    /// Connect to the peer stored in `slot`.
    ///
    /// Fails with `NoTrustedAddress`, without touching the radio or the
    /// current session, if the slot holds the unset sentinel.
    pub async fn auto_connect<D: DelayNs>(
        &mut self,
        central: &C,
        delay: &mut D,
        slot: TrustSlot,
        trusted: &TrustedPeer,
    ) -> Result<(), ConnectError> {
        if !trusted.is_set() {
            warn!("{} address is not stored", slot);
            let e = ConnectError::NoTrustedAddress;
            self.observer.on_event(&SessionEvent::ConnectFailed(e));
            return Err(e);
        }

        let peer = PeerInfo::new(trusted.address, slot.display_name());
        self.connect(central, delay, peer, slot.confirmation()).await
    }

    /// Close the session, if any. Safe to call when already idle.
    ///
    /// `DISCONNECT` is sent best-effort; the link may already be gone.
    pub async fn disconnect(&mut self, central: &C) {
        let Some(session) = self.session.take() else {
            self.set_state(SessionState::Idle);
            return;
        };

        info!("Disconnecting from {}", session.peer.address);
        let token = StatusToken::Disconnect;
        if let Err(e) = central
            .write(&session.link, &session.channel, encode_text(token.as_str()))
            .await
        {
            debug!("{} not delivered: {}", token.as_str(), e);
        }

        central.release(session.link);
        self.set_state(SessionState::Idle);
        self.observer.on_event(&SessionEvent::Disconnected(session.peer));
        info!("BLE disconnected");
    }

    /// Write raw bytes to the relay characteristic.
    ///
    /// A failure leaves the session as it was; only the liveness check
    /// tears sessions down.
    pub async fn send_command(&self, central: &C, data: &[u8]) -> Result<(), CommandError> {
        let Some(session) = self.session.as_ref() else {
            warn!("Cannot send: not connected");
            return Err(CommandError::NotConnected);
        };
        if !central.is_connected(&session.link) {
            warn!("Cannot send: link is down");
            return Err(CommandError::NotConnected);
        }

        central
            .write(&session.link, &session.channel, data)
            .await
            .inspect_err(|e| warn!("BLE write failed: {}", e))?;
        debug!("BLE sent: {:x}", data);
        Ok(())
    }

    pub async fn send_text(&self, central: &C, text: &str) -> Result<(), CommandError> {
        self.send_command(central, encode_text(text)).await
    }

    /// Drop the session if the radio no longer reports the link connected.
    /// Returns `true` if it did.
    pub async fn check_liveness(&mut self, central: &C) -> bool {
        let lost = matches!(&self.session, Some(s) if !central.is_connected(&s.link));
        if lost {
            warn!("BLE connection lost");
            self.disconnect(central).await;
        }
        lost
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session: {} -> {}", self.state, state);
            self.state = state;
            self.observer.on_event(&SessionEvent::StateChanged(state));
        }
    }
}
