//! Hardware addresses of BLE peers.

use crate::codec::decode_hex_byte;
use core::fmt;
use core::fmt::Write;
use core::str::FromStr;
use heapless::String;

/// Length of the canonical `XX:XX:XX:XX:XX:XX` form.
pub const ADDRESS_TEXT_LEN: usize = 17;

/// A 6-byte hardware address, most significant byte first (display order).
///
/// Parsing is case-insensitive and rendering is upper-case, so comparing two
/// `PeerAddress` values is the case-normalised string match the registry
/// and scanner rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddress([u8; 6]);

/// Returned when a string is not of the form `XX:XX:XX:XX:XX:XX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseAddressError;

impl PeerAddress {
    /// All-zero sentinel: "no device designated".
    pub const UNSET: PeerAddress = PeerAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Canonical upper-case text form.
    pub fn to_text(&self) -> String<ADDRESS_TEXT_LEN> {
        let mut s = String::new();
        let _ = write!(s, "{}", self);
        s
    }
}

impl FromStr for PeerAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().as_bytes();
        if text.len() != ADDRESS_TEXT_LEN {
            return Err(ParseAddressError);
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let at = i * 3;
            if i > 0 && text[at - 1] != b':' {
                return Err(ParseAddressError);
            }
            *byte = decode_hex_byte(text[at], text[at + 1]).ok_or(ParseAddressError)?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PeerAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.to_text().as_str())
    }
}
