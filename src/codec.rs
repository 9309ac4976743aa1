//! Relay board wire format.
//!
//! Everything written to the relay characteristic is either a fixed 4-byte
//! relay frame `[0xA0, relay, on, checksum]` or a raw UTF-8 status token.

use crate::config::{MAX_PAYLOAD_LEN, RELAY_COUNT};
use crate::error::CommandError;
use heapless::Vec;

/// First byte of every relay frame.
pub const FRAME_HEADER: u8 = 0xA0;

/// Length of a relay frame.
pub const FRAME_LEN: usize = 4;

pub type Frame = [u8; FRAME_LEN];

/// Arbitrary payload decoded from a hex string.
pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// Frames the relay board accepts, indexed by relay then `[off, on]`.
///
/// The last byte matches the sum of the first three, but the board was only
/// ever verified against these literals, so the table is authoritative.
const RELAY_FRAMES: [[Frame; 2]; RELAY_COUNT] = [
    [[0xA0, 0x01, 0x00, 0xA1], [0xA0, 0x01, 0x01, 0xA2]],
    [[0xA0, 0x02, 0x00, 0xA2], [0xA0, 0x02, 0x01, 0xA3]],
    [[0xA0, 0x03, 0x00, 0xA3], [0xA0, 0x03, 0x01, 0xA4]],
    [[0xA0, 0x04, 0x00, 0xA4], [0xA0, 0x04, 0x01, 0xA5]],
];

/// One of the relays on the board, numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Relay(u8);

impl Relay {
    pub const ALL: [Relay; RELAY_COUNT] = [Relay(1), Relay(2), Relay(3), Relay(4)];

    /// `None` unless `number` is in `1..=RELAY_COUNT`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=RELAY_COUNT as u8)
            .contains(&number)
            .then_some(Relay(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position, for indexing per-relay tables.
    pub fn position(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Status tokens sent as plain text over the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusToken {
    /// Sent after connecting to a scanned peer or the Primary slot.
    Connected,
    /// Sent after auto-connecting to the Secondary slot.
    ConnectedToTarget2,
    /// Sent before an orderly disconnect.
    Disconnect,
}

impl StatusToken {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusToken::Connected => "CONNECTED",
            StatusToken::ConnectedToTarget2 => "CONNECTED_TO_TARGET2",
            StatusToken::Disconnect => "DISCONNECT",
        }
    }
}

/// Frame switching `relay` on or off.
pub fn encode_relay_command(relay: Relay, on: bool) -> Frame {
    RELAY_FRAMES[relay.position()][on as usize]
}

/// Convert a string of hex digit pairs into bytes.
///
/// Fails with `MalformedInput` on odd length, on any non-hex digit, or when
/// the result would not fit in a single write.
pub fn encode_hex_string(hex: &str) -> Result<Payload, CommandError> {
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(CommandError::MalformedInput);
    }

    let mut out = Payload::new();
    for pair in digits.chunks_exact(2) {
        let byte = decode_hex_byte(pair[0], pair[1]).ok_or(CommandError::MalformedInput)?;
        out.push(byte).map_err(|_| CommandError::MalformedInput)?;
    }
    Ok(out)
}

/// Raw bytes of a text payload.
pub fn encode_text(data: &str) -> &[u8] {
    data.as_bytes()
}

/// Decode two ASCII hex digits (either case) into a byte.
pub(crate) fn decode_hex_byte(hi: u8, lo: u8) -> Option<u8> {
    Some(hex_nibble(hi)? << 4 | hex_nibble(lo)?)
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
