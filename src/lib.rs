//! Host-testable core of relay-panel.
//!
//! Everything that decides behaviour lives here: the peer registry, the
//! discovery scanner, the session state machine and the wire codec. The
//! radio, flash and clock are reached through traits, so the same code runs
//! on the nRF52840 (see `main.rs`) and against `ble::sim` on the host.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main].
//! This crate stays `no_std` outside of tests.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
mod fmt;

pub mod address;
pub mod ble;
pub mod codec;
pub mod config;
pub mod error;
pub mod panel;
pub mod storage;

pub use address::PeerAddress;
pub use ble::session::{SessionEvent, SessionManager, SessionObserver, SessionState};
pub use ble::{Central, PeerCandidate, PeerInfo};
pub use codec::{Relay, StatusToken};
pub use error::{CommandError, ConnectError, Error, ScanError, StorageError};
pub use panel::{Panel, PanelCommand, SessionStatus};
pub use storage::{KvStore, PeerRegistry, StorageKey, TrustSlot, TrustedPeer};
