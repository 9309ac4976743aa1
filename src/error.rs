//! Error types for relay-panel.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! With the `defmt` feature every type implements `defmt::Format` for
//! efficient on-target logging.

/// Top-level error type returned by the panel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// Establishing a session failed.
    Connect(ConnectError),

    /// Writing to the active session failed.
    Command(CommandError),

    /// Discovery could not run.
    Scan(ScanError),

    // Storage
    /// The key-value store could not be read or written.
    Storage(StorageError),

    // Selection
    /// Candidate index is outside the current scan result.
    InvalidSelection,

    /// An operation needed a selected candidate but none is selected.
    NothingSelected,

    /// A hardware address string could not be parsed.
    InvalidAddress,
}

/// Failures of `connect` / `auto_connect`. Each is terminal for the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectError {
    /// The transport link could not be established.
    LinkFailed,
    /// The relay service (0xFFE0) is not present on the peer.
    ServiceMissing,
    /// The relay write characteristic (0xFFE1) is not present.
    CharacteristicMissing,
    /// The trusted slot still holds the unset sentinel address.
    NoTrustedAddress,
}

/// Failures of writes over the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// No active session, or the link is already gone.
    NotConnected,
    /// Payload could not be encoded (odd-length or non-hex string, too long).
    MalformedInput,
    /// The transport rejected the write.
    WriteFailed,
}

/// Durable storage failures. There is no recovery path; callers log them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    Unavailable,
}

/// Discovery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanError {
    /// A scan is already running; the request was ignored.
    Busy,
    /// The radio could not start or complete the scan.
    RadioFailed,
}

// Convenience conversions

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::Connect(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Error::Command(e)
    }
}

impl From<ScanError> for Error {
    fn from(e: ScanError) -> Self {
        Error::Scan(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<crate::address::ParseAddressError> for Error {
    fn from(_: crate::address::ParseAddressError) -> Self {
        Error::InvalidAddress
    }
}
