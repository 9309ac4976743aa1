//! Persistent registry of trusted peers.
//!
//! Storage layout (one namespace, `ble_storage`):
//!   - `target1_mac`  - Primary slot address, text form, factory default
//!     `B4:52:A9:B0:0F:BB`.
//!   - `target2_mac`  - Secondary slot address, text form, default is the
//!     all-zero "unset" sentinel.
//!   - `auto_connect` - one byte, 0 or 1, default 1.
//!
//! The registry keeps an in-memory copy that is refreshed on every write, so
//! reads never touch the store after `load`.

use crate::address::{PeerAddress, ADDRESS_TEXT_LEN};
use crate::ble::{peer_name, PeerName};
use crate::codec::StatusToken;
use crate::config;
use crate::error::StorageError;

/// Durable key-value store the registry persists into.
///
/// Implemented over internal flash on the device and in memory for tests.
#[allow(async_fn_in_trait)]
pub trait KvStore {
    /// Copy the value stored under `key` into `buf`, returning its length,
    /// or `None` if the key was never written.
    async fn read(&mut self, key: StorageKey, buf: &mut [u8]) -> Result<Option<usize>, StorageError>;

    /// Overwrite the value stored under `key`.
    async fn write(&mut self, key: StorageKey, value: &[u8]) -> Result<(), StorageError>;
}

/// The three durable keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageKey {
    Target1Mac,
    Target2Mac,
    AutoConnect,
}

impl StorageKey {
    pub fn name(self) -> &'static str {
        match self {
            StorageKey::Target1Mac => "target1_mac",
            StorageKey::Target2Mac => "target2_mac",
            StorageKey::AutoConnect => "auto_connect",
        }
    }

    /// Compact id for stores keyed by integers.
    pub fn id(self) -> u8 {
        match self {
            StorageKey::Target1Mac => 0x01,
            StorageKey::Target2Mac => 0x02,
            StorageKey::AutoConnect => 0x03,
        }
    }
}

/// One of the two trusted peer slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrustSlot {
    Primary,
    Secondary,
}

impl TrustSlot {
    pub const ALL: [TrustSlot; 2] = [TrustSlot::Primary, TrustSlot::Secondary];

    pub fn key(self) -> StorageKey {
        match self {
            TrustSlot::Primary => StorageKey::Target1Mac,
            TrustSlot::Secondary => StorageKey::Target2Mac,
        }
    }

    pub fn default_address(self) -> PeerAddress {
        let text = match self {
            TrustSlot::Primary => config::DEFAULT_PRIMARY_ADDRESS,
            TrustSlot::Secondary => config::UNSET_ADDRESS,
        };
        text.parse().unwrap_or(PeerAddress::UNSET)
    }

    /// Name used for the slot when no scanned name is known.
    pub fn display_name(self) -> &'static str {
        match self {
            TrustSlot::Primary => config::PRIMARY_DISPLAY_NAME,
            TrustSlot::Secondary => config::SECONDARY_DISPLAY_NAME,
        }
    }

    /// Token announcing a successful auto-connect to this slot.
    pub fn confirmation(self) -> StatusToken {
        match self {
            TrustSlot::Primary => StatusToken::Connected,
            TrustSlot::Secondary => StatusToken::ConnectedToTarget2,
        }
    }
}

/// A remembered peer identity.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrustedPeer {
    pub address: PeerAddress,
    pub display_name: PeerName,
}

impl TrustedPeer {
    fn factory(slot: TrustSlot) -> Self {
        Self {
            address: slot.default_address(),
            display_name: peer_name(slot.display_name()),
        }
    }

    pub fn is_set(&self) -> bool {
        !self.address.is_unset()
    }
}

/// Everything the registry holds.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistrySnapshot {
    pub primary: TrustedPeer,
    pub secondary: TrustedPeer,
    pub auto_connect: bool,
}

/// In-memory view of the trusted peers, synced with the store.
pub struct PeerRegistry<S> {
    store: S,
    primary: TrustedPeer,
    secondary: TrustedPeer,
    auto_connect: bool,
}

impl<S: KvStore> PeerRegistry<S> {
    /// Registry holding factory defaults; call [`load`](Self::load) to read the store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            primary: TrustedPeer::factory(TrustSlot::Primary),
            secondary: TrustedPeer::factory(TrustSlot::Secondary),
            auto_connect: config::DEFAULT_AUTO_CONNECT,
        }
    }

    /// Read all keys, falling back to factory defaults for anything missing,
    /// malformed or unreadable. Never fails.
    pub async fn load(&mut self) -> RegistrySnapshot {
        for slot in TrustSlot::ALL {
            let address = self.load_address(slot).await;
            let peer = self.peer_mut(slot);
            if peer.address != address {
                // A stored address replaces whatever name we had for the factory one.
                peer.display_name = peer_name(slot.display_name());
            }
            peer.address = address;
        }
        self.auto_connect = self.load_auto_connect().await;

        info!(
            "Loaded {}: primary={} secondary={} auto_connect={}",
            config::STORAGE_NAMESPACE,
            self.primary.address,
            self.secondary.address,
            self.auto_connect
        );
        self.snapshot()
    }

    async fn load_address(&mut self, slot: TrustSlot) -> PeerAddress {
        let key = slot.key();
        let mut buf = [0u8; ADDRESS_TEXT_LEN + 1];
        match self.store.read(key, &mut buf).await {
            Ok(Some(len)) => {
                let parsed = core::str::from_utf8(&buf[..len.min(buf.len())])
                    .ok()
                    .and_then(|s| s.parse::<PeerAddress>().ok());
                match parsed {
                    Some(address) => address,
                    None => {
                        warn!("{}: malformed value, using default", key.name());
                        slot.default_address()
                    }
                }
            }
            Ok(None) => {
                debug!("{}: not stored, using default", key.name());
                slot.default_address()
            }
            Err(e) => {
                error!("{}: read failed: {}", key.name(), e);
                slot.default_address()
            }
        }
    }

    async fn load_auto_connect(&mut self) -> bool {
        let key = StorageKey::AutoConnect;
        let mut buf = [0u8; 1];
        match self.store.read(key, &mut buf).await {
            Ok(Some(1)) => buf[0] != 0,
            Ok(Some(_)) => {
                warn!("{}: malformed value, using default", key.name());
                config::DEFAULT_AUTO_CONNECT
            }
            Ok(None) => config::DEFAULT_AUTO_CONNECT,
            Err(e) => {
                error!("{}: read failed: {}", key.name(), e);
                config::DEFAULT_AUTO_CONNECT
            }
        }
    }

    /// Designate `address` as the peer for `slot`.
    ///
    /// The in-memory view is updated before the write, so it reflects the
    /// user's choice even if the store is unavailable. The record is always
    /// rewritten, so retrying after a failed write persists it.
    pub async fn set_trusted(
        &mut self,
        slot: TrustSlot,
        address: PeerAddress,
        display_name: &str,
    ) -> Result<(), StorageError> {
        let peer = self.peer_mut(slot);
        peer.display_name = peer_name(display_name);
        peer.address = address;

        let text = address.to_text();
        self.store.write(slot.key(), text.as_bytes()).await.inspect_err(|e| {
            error!("{}: write failed: {}", slot.key().name(), e);
        })?;
        info!("Saved {} = {}", slot.key().name(), address);
        Ok(())
    }

    /// Persist the auto-connect preference.
    pub async fn set_auto_connect(&mut self, enabled: bool) -> Result<(), StorageError> {
        self.auto_connect = enabled;
        let key = StorageKey::AutoConnect;
        self.store.write(key, &[enabled as u8]).await.inspect_err(|e| {
            error!("{}: write failed: {}", key.name(), e);
        })?;
        info!("Saved {} = {}", key.name(), enabled);
        Ok(())
    }

    pub fn trusted(&self, slot: TrustSlot) -> &TrustedPeer {
        match slot {
            TrustSlot::Primary => &self.primary,
            TrustSlot::Secondary => &self.secondary,
        }
    }

    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }

    /// Slot whose address equals `address`, Primary first. Unset slots never match.
    pub fn slot_for(&self, address: &PeerAddress) -> Option<TrustSlot> {
        TrustSlot::ALL.into_iter().find(|&slot| {
            let peer = self.trusted(slot);
            peer.is_set() && peer.address == *address
        })
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            auto_connect: self.auto_connect,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn peer_mut(&mut self, slot: TrustSlot) -> &mut TrustedPeer {
        match slot {
            TrustSlot::Primary => &mut self.primary,
            TrustSlot::Secondary => &mut self.secondary,
        }
    }
}
