//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, protocol constants and storage layout live here
//! so they can be tuned in one place.

// BLE

/// Advertised name of this controller.
pub const DEVICE_NAME: &str = "POV_BLE_Controller";

/// Duration of a discovery scan (seconds).
pub const BLE_SCAN_DURATION_SECS: u64 = 5;

/// Maximum number of candidates kept from one scan.
pub const BLE_MAX_DISCOVERED: usize = 16;

/// Scan interval and window (in 0.625 ms units). 160 = 100 ms, 158 ≈ 99 ms.
pub const BLE_SCAN_INTERVAL: u16 = 160;
pub const BLE_SCAN_WINDOW: u16 = 158;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Capacity of peer names (bytes).
pub const NAME_CAPACITY: usize = 32;

/// Largest payload written in one go (default ATT MTU 23 - 3 header bytes).
pub const MAX_PAYLOAD_LEN: usize = 20;

// Relay service

/// Relay board service UUID `0000FFE0-0000-1000-8000-00805F9B34FB`.
pub const RELAY_SERVICE_UUID: u128 = 0x0000FFE0_0000_1000_8000_00805F9B34FB;

/// Relay board write characteristic UUID `0000FFE1-0000-1000-8000-00805F9B34FB`.
pub const RELAY_CHARACTERISTIC_UUID: u128 = 0x0000FFE1_0000_1000_8000_00805F9B34FB;

/// Number of relays on the board.
pub const RELAY_COUNT: usize = 4;

// Session timing

/// Period of the liveness check (seconds).
pub const LIVENESS_PERIOD_SECS: u64 = 2;

/// Pause after tearing down an old session before dialling a new one (ms).
pub const RECONNECT_SETTLE_MS: u32 = 500;

/// Pause between service resolution and the first status token (ms).
pub const CONFIRM_DELAY_MS: u32 = 100;

/// Pause before the boot-time auto-connect, letting the radio settle (ms).
pub const BOOT_SETTLE_MS: u32 = 1000;

// Trusted peers

/// Factory address of the Primary slot, used until the user overwrites it.
pub const DEFAULT_PRIMARY_ADDRESS: &str = "B4:52:A9:B0:0F:BB";

/// Unset sentinel address for the Secondary slot.
pub const UNSET_ADDRESS: &str = "00:00:00:00:00:00";

/// Slot-derived display names.
pub const PRIMARY_DISPLAY_NAME: &str = "MY TARGET DEVICE";
pub const SECONDARY_DISPLAY_NAME: &str = "TARGET2 DEVICE";

/// Auto-connect at boot unless the user turned it off.
pub const DEFAULT_AUTO_CONNECT: bool = true;

// Key-value storage

/// Namespace holding the three durable keys.
pub const STORAGE_NAMESPACE: &str = "ble_storage";

/// Flash page index where the key-value store starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for the key-value store.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

// GPIO pin assignments (nRF52840-DK defaults)
//
// Chosen in `main.rs`; adjust for your custom PCB.
//
//   Relay 1 button → P0.11
//   Relay 2 button → P0.12
//   Relay 3 button → P0.24
//   Relay 4 button → P0.25
//   Status LED     → P0.13 (LED1, active-low)

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;
