//! BLE GAP scanner - discovers nearby peripherals.
//!
//! A scan runs for a fixed window and replaces the previous candidate list
//! when it completes. Candidates are kept in the order the radio reported
//! them; duplicates are the radio's business, not ours. Once the window
//! closes, each candidate is annotated with the trusted slot it matches.

use core::cell::{Cell, Ref, RefCell};

use crate::ble::adv_parser::extract_device_name;
use crate::ble::{Central, PeerCandidate};
use crate::config::BLE_MAX_DISCOVERED;
use crate::error::ScanError;
use crate::storage::{KvStore, PeerRegistry};
use heapless::Vec;

pub type Candidates = Vec<PeerCandidate, BLE_MAX_DISCOVERED>;

/// Holds the result of the last scan.
///
/// Takes `&self` so a presentation task can read candidates while a scan is
/// pending; the `scanning` flag turns away a second scan instead of letting
/// two fill the list at once.
pub struct Scanner {
    scanning: Cell<bool>,
    candidates: RefCell<Candidates>,
}

/// Clears the scanning flag however the scan ends.
struct ScanGuard<'a>(&'a Cell<bool>);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scanner {
    pub const fn new() -> Self {
        Self {
            scanning: Cell::new(false),
            candidates: RefCell::new(Vec::new()),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.get()
    }

    /// Run a scan for `duration_secs` seconds and return how many
    /// candidates were found.
    ///
    /// Fails with `Busy` if a scan is already running; the running scan and
    /// the current list are left untouched. A radio failure leaves an empty
    /// list.
    pub async fn scan<C, S>(
        &self,
        central: &C,
        registry: &PeerRegistry<S>,
        duration_secs: u64,
    ) -> Result<usize, ScanError>
    where
        C: Central,
        S: KvStore,
    {
        if self.scanning.replace(true) {
            warn!("Scan already in progress - request ignored");
            return Err(ScanError::Busy);
        }
        let _guard = ScanGuard(&self.scanning);

        info!("BLE scan starting ({} s window)", duration_secs);
        self.candidates.borrow_mut().clear();

        let mut found = Candidates::new();
        let result = central
            .scan(duration_secs, |report| {
                let candidate = PeerCandidate {
                    name: extract_device_name(report.data),
                    address: report.address,
                    rssi: report.rssi,
                    trusted_slot: None,
                };
                debug!(
                    "Found: {} - {} ({} dB)",
                    candidate.name.as_str(),
                    candidate.address,
                    candidate.rssi
                );
                let _ = found.push(candidate);

                // Buffer full - stop early.
                found.is_full().then_some(())
            })
            .await;

        if let Err(e) = result {
            warn!("BLE scan ended with error: {}", e);
            return Err(e);
        }

        for candidate in found.iter_mut() {
            candidate.trusted_slot = registry.slot_for(&candidate.address);
        }

        let count = found.len();
        *self.candidates.borrow_mut() = found;
        info!("BLE scan complete - {} devices found", count);
        Ok(count)
    }

    /// Candidates from the last completed scan.
    pub fn candidates(&self) -> Ref<'_, [PeerCandidate]> {
        Ref::map(self.candidates.borrow(), |c| c.as_slice())
    }

    pub fn candidate(&self, index: usize) -> Option<PeerCandidate> {
        self.candidates.borrow().get(index).cloned()
    }

    /// Re-annotate candidates after the trusted slots changed.
    pub fn refresh_trust<S: KvStore>(&self, registry: &PeerRegistry<S>) {
        for candidate in self.candidates.borrow_mut().iter_mut() {
            candidate.trusted_slot = registry.slot_for(&candidate.address);
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
