//! Unit tests for the scanner and the session state machine.
//!
//! These run on the host against `SimCentral`, which counts every radio
//! call so leaks and stray transport operations show up as numbers.

use super::scanner::Scanner;
use super::session::{SessionEvent, SessionManager, SessionState};
use super::sim::{EventLog, MemoryStore, SimCentral, SimDelay, SimPeer};
use super::PeerInfo;
use crate::address::PeerAddress;
use crate::codec::{encode_relay_command, Relay, StatusToken};
use crate::config::{BLE_MAX_DISCOVERED, RECONNECT_SETTLE_MS};
use crate::error::{CommandError, ConnectError, ScanError};
use crate::storage::{PeerRegistry, TrustSlot, TrustedPeer};
use embassy_futures::{block_on, join::join};

const BOARD_A: &str = "AA:00:00:00:00:01";
const BOARD_B: &str = "BB:00:00:00:00:02";

fn addr(s: &str) -> PeerAddress {
    s.parse().unwrap()
}

fn board(s: &str, name: &'static str) -> SimPeer {
    SimPeer::relay_board(addr(s), name)
}

fn peer(s: &str, name: &str) -> PeerInfo {
    PeerInfo::new(addr(s), name)
}

fn logged_session() -> SessionManager<SimCentral, EventLog> {
    SessionManager::with_observer(EventLog::new())
}

// ═══════════════════════════════════════════════════════════════════════════
// Scanner Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scan_lists_candidates_in_discovery_order() {
    let central = SimCentral::with_peers(&[board(BOARD_B, "Y"), board(BOARD_A, "X")]);
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();

    assert_eq!(block_on(scanner.scan(&central, &registry, 5)), Ok(2));

    let found = scanner.candidates();
    assert_eq!(found[0].address, addr(BOARD_B));
    assert_eq!(found[0].name.as_str(), "Y");
    assert_eq!(found[0].rssi, -60);
    assert_eq!(found[1].address, addr(BOARD_A));
}

#[test]
fn scan_marks_trusted_candidates() {
    let central = SimCentral::with_peers(&[
        board("B4:52:A9:B0:0F:BB", "Factory"),
        board(BOARD_A, "X"),
        board(BOARD_B, "Y"),
    ]);
    let mut registry = PeerRegistry::new(MemoryStore::new());
    block_on(registry.set_trusted(TrustSlot::Secondary, addr(BOARD_B), "Y")).unwrap();
    let scanner = Scanner::new();

    block_on(scanner.scan(&central, &registry, 5)).unwrap();

    let found = scanner.candidates();
    assert_eq!(found[0].trusted_slot, Some(TrustSlot::Primary));
    assert_eq!(found[1].trusted_slot, None);
    assert_eq!(found[2].trusted_slot, Some(TrustSlot::Secondary));
}

#[test]
fn unnamed_peer_is_unknown_device() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "")]);
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();

    block_on(scanner.scan(&central, &registry, 5)).unwrap();
    assert_eq!(scanner.candidates()[0].name.as_str(), "Unknown Device");
}

#[test]
fn concurrent_scan_is_rejected() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();

    let (first, second) = block_on(join(
        scanner.scan(&central, &registry, 5),
        scanner.scan(&central, &registry, 5),
    ));

    assert_eq!(first, Ok(1));
    assert_eq!(second, Err(ScanError::Busy));
    assert_eq!(central.scan_calls(), 1);
    assert_eq!(scanner.candidates().len(), 1);
    assert!(!scanner.is_scanning());
}

#[test]
fn new_scan_replaces_previous_candidates() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();

    block_on(scanner.scan(&central, &registry, 5)).unwrap();
    central.add_peer(board(BOARD_B, "Y"));
    block_on(scanner.scan(&central, &registry, 5)).unwrap();

    assert_eq!(scanner.candidates().len(), 2);
}

#[test]
fn radio_failure_leaves_empty_list_and_clears_flag() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();
    block_on(scanner.scan(&central, &registry, 5)).unwrap();

    central.set_radio_fails(true);
    assert_eq!(
        block_on(scanner.scan(&central, &registry, 5)),
        Err(ScanError::RadioFailed)
    );
    assert!(scanner.candidates().is_empty());
    assert!(!scanner.is_scanning());
}

#[test]
fn scan_stops_when_buffer_full() {
    let central = SimCentral::new();
    let registry = PeerRegistry::new(MemoryStore::new());
    let scanner = Scanner::new();

    for i in 0..(BLE_MAX_DISCOVERED as u8 + 4) {
        central.add_peer(SimPeer::relay_board(
            PeerAddress::new([0xCC, 0, 0, 0, 0, i]),
            "Z",
        ));
    }
    let found = block_on(scanner.scan(&central, &registry, 5)).unwrap();

    assert_eq!(found, BLE_MAX_DISCOVERED);
    let last = &scanner.candidates()[BLE_MAX_DISCOVERED - 1];
    assert_eq!(last.address.bytes()[5], BLE_MAX_DISCOVERED as u8 - 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Session Connect Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn connect_reaches_active_and_announces() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session = logged_session();

    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.peer(), Some(&peer(BOARD_A, "X")));
    assert_eq!(central.open_links(), 1);
    assert_eq!(central.written().len(), 1);
    assert_eq!(central.written()[0].as_slice(), b"CONNECTED");
    assert_eq!(
        session.observer().events(),
        &[
            SessionEvent::StateChanged(SessionState::Connecting),
            SessionEvent::StateChanged(SessionState::ServiceResolving),
            SessionEvent::StateChanged(SessionState::Active),
            SessionEvent::Connected(peer(BOARD_A, "X")),
        ]
    );
}

#[test]
fn link_failure_returns_to_idle_without_leak() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X").refusing()]);
    let mut delay = SimDelay::new();
    let mut session = logged_session();

    let result =
        block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected));

    assert_eq!(result, Err(ConnectError::LinkFailed));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_active());
    assert_eq!(central.open_links(), 0);
    assert_eq!(central.write_attempts(), 0);
    assert_eq!(
        session.observer().events(),
        &[
            SessionEvent::StateChanged(SessionState::Connecting),
            SessionEvent::StateChanged(SessionState::Idle),
            SessionEvent::ConnectFailed(ConnectError::LinkFailed),
        ]
    );
}

#[test]
fn unknown_address_is_link_failure() {
    let central = SimCentral::new();
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    let result =
        block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected));
    assert_eq!(result, Err(ConnectError::LinkFailed));
    assert_eq!(central.connect_calls(), 1);
}

#[test]
fn missing_service_releases_link() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X").without_service()]);
    let mut delay = SimDelay::new();
    let mut session = logged_session();

    let result =
        block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected));

    assert_eq!(result, Err(ConnectError::ServiceMissing));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(central.open_links(), 0);
    assert!(session
        .observer()
        .events()
        .contains(&SessionEvent::StateChanged(SessionState::ServiceResolving)));
}

#[test]
fn missing_characteristic_releases_link() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X").without_characteristic()]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    let result =
        block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected));

    assert_eq!(result, Err(ConnectError::CharacteristicMissing));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(central.open_links(), 0);
    assert_eq!(central.write_attempts(), 0);
}

#[test]
fn connect_while_active_tears_down_first() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X"), board(BOARD_B, "Y")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();
    let before = delay.elapsed_ms();
    block_on(session.connect(&central, &mut delay, peer(BOARD_B, "Y"), StatusToken::Connected))
        .unwrap();

    assert_eq!(session.peer().map(|p| p.address), Some(addr(BOARD_B)));
    assert_eq!(central.open_links(), 1);
    assert_eq!(central.count_written(b"DISCONNECT"), 1);
    assert_eq!(central.count_written(b"CONNECTED"), 2);
    assert!(delay.elapsed_ms() - before >= u64::from(RECONNECT_SETTLE_MS));
}

#[test]
fn read_only_characteristic_is_written_anyway() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X").read_only()]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();
    let frame = encode_relay_command(Relay::new(1).unwrap(), true);
    block_on(session.send_command(&central, &frame)).unwrap();

    assert_eq!(central.count_written(&frame), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Auto-connect Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn auto_connect_unset_slot_never_touches_radio() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session = logged_session();
    let unset = TrustedPeer {
        address: PeerAddress::UNSET,
        display_name: super::peer_name("TARGET2 DEVICE"),
    };

    let result = block_on(session.auto_connect(&central, &mut delay, TrustSlot::Secondary, &unset));

    assert_eq!(result, Err(ConnectError::NoTrustedAddress));
    assert_eq!(central.connect_calls(), 0);
    assert_eq!(central.open_links(), 0);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(
        session.observer().events(),
        &[SessionEvent::ConnectFailed(ConnectError::NoTrustedAddress)]
    );
}

#[test]
fn auto_connect_unset_slot_keeps_current_session() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();

    let unset = TrustedPeer {
        address: PeerAddress::UNSET,
        display_name: super::peer_name("TARGET2 DEVICE"),
    };
    let result = block_on(session.auto_connect(&central, &mut delay, TrustSlot::Secondary, &unset));

    assert_eq!(result, Err(ConnectError::NoTrustedAddress));
    assert!(session.is_active());
    assert_eq!(central.connect_calls(), 1);
}

#[test]
fn auto_connect_secondary_sends_slot_token() {
    let central = SimCentral::with_peers(&[board(BOARD_B, "Y")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    let trusted = TrustedPeer {
        address: addr(BOARD_B),
        display_name: super::peer_name("Y"),
    };

    block_on(session.auto_connect(&central, &mut delay, TrustSlot::Secondary, &trusted)).unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.peer().unwrap().name.as_str(), "TARGET2 DEVICE");
    assert_eq!(central.written()[0].as_slice(), b"CONNECTED_TO_TARGET2");
}

#[test]
fn auto_connect_primary_sends_connected() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    let trusted = TrustedPeer {
        address: addr(BOARD_A),
        display_name: super::peer_name("X"),
    };

    block_on(session.auto_connect(&central, &mut delay, TrustSlot::Primary, &trusted)).unwrap();

    assert_eq!(session.peer().unwrap().name.as_str(), "MY TARGET DEVICE");
    assert_eq!(central.written()[0].as_slice(), b"CONNECTED");
}

// ═══════════════════════════════════════════════════════════════════════════
// Disconnect / Liveness / Send Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn disconnect_twice_is_harmless() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session = logged_session();
    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();
    session.observer_mut().clear();

    block_on(session.disconnect(&central));
    assert_eq!(session.state(), SessionState::Idle);
    block_on(session.disconnect(&central));
    assert_eq!(session.state(), SessionState::Idle);

    assert_eq!(central.open_links(), 0);
    assert_eq!(central.count_written(b"DISCONNECT"), 1);
    assert_eq!(
        session.observer().events(),
        &[
            SessionEvent::StateChanged(SessionState::Idle),
            SessionEvent::Disconnected(peer(BOARD_A, "X")),
        ]
    );
}

#[test]
fn disconnect_when_never_connected() {
    let central = SimCentral::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    block_on(session.disconnect(&central));

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(central.write_attempts(), 0);
}

#[test]
fn liveness_drops_silent_session() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();
    let attempts = central.write_attempts();

    central.drop_link();
    assert!(block_on(session.check_liveness(&central)));

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(central.open_links(), 0);
    // Exactly one best-effort DISCONNECT, which fails on the dead link.
    assert_eq!(central.write_attempts(), attempts + 1);
    assert_eq!(central.count_written(b"DISCONNECT"), 0);
}

#[test]
fn liveness_keeps_healthy_session() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    assert!(!block_on(session.check_liveness(&central)));

    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();
    assert!(!block_on(session.check_liveness(&central)));
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn send_without_session_is_not_connected() {
    let central = SimCentral::new();
    let session: SessionManager<SimCentral> = SessionManager::new();

    assert_eq!(
        block_on(session.send_text(&central, "CONNECTED")),
        Err(CommandError::NotConnected)
    );
    assert_eq!(central.write_attempts(), 0);
}

#[test]
fn send_on_dead_link_does_not_disconnect() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();

    central.drop_link();
    assert_eq!(
        block_on(session.send_text(&central, "X")),
        Err(CommandError::NotConnected)
    );
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn write_failure_keeps_session() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();
    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();

    central.set_writes_fail(true);
    let frame = encode_relay_command(Relay::new(2).unwrap(), false);
    assert_eq!(
        block_on(session.send_command(&central, &frame)),
        Err(CommandError::WriteFailed)
    );
    assert!(session.is_active());
    assert_eq!(central.open_links(), 1);
}

#[test]
fn failed_announcement_still_connects() {
    let central = SimCentral::with_peers(&[board(BOARD_A, "X")]);
    central.set_writes_fail(true);
    let mut delay = SimDelay::new();
    let mut session: SessionManager<SimCentral> = SessionManager::new();

    block_on(session.connect(&central, &mut delay, peer(BOARD_A, "X"), StatusToken::Connected))
        .unwrap();

    assert!(session.is_active());
    assert_eq!(central.write_attempts(), 1);
}
