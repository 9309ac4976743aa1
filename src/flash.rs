//! Key-value store over the nRF52840's internal flash.
//!
//! Backs the peer registry with `sequential-storage`'s map, which handles
//! wear levelling and garbage collection over the reserved pages. Each
//! registry key is stored as one item keyed by its one-byte id.

use defmt::{debug, error};
use embedded_storage_async::nor_flash::NorFlash;
use relay_panel::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use relay_panel::error::StorageError;
use relay_panel::storage::{KvStore, StorageKey};
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Scratch space for one item plus its header; every value is at most 17 bytes.
const ITEM_BUFFER_LEN: usize = 64;

pub struct FlashStore<F> {
    flash: F,
    buffer: [u8; ITEM_BUFFER_LEN],
}

impl<F: NorFlash> FlashStore<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            buffer: [0; ITEM_BUFFER_LEN],
        }
    }
}

impl<F: NorFlash> KvStore for FlashStore<F> {
    async fn read(&mut self, key: StorageKey, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        match fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut self.buffer,
            &key.id(),
        )
        .await
        {
            Ok(Some(value)) => {
                let n = value.len().min(buf.len());
                buf[..n].copy_from_slice(&value[..n]);
                Ok(Some(value.len()))
            }
            Ok(None) => {
                debug!("Flash: {} not found", key.name());
                Ok(None)
            }
            Err(e) => {
                error!("Flash read error: {:?}", defmt::Debug2Format(&e));
                Err(StorageError::Unavailable)
            }
        }
    }

    async fn write(&mut self, key: StorageKey, value: &[u8]) -> Result<(), StorageError> {
        match store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut self.buffer,
            &key.id(),
            &value,
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Flash write error: {:?}", defmt::Debug2Format(&e));
                Err(StorageError::Unavailable)
            }
        }
    }
}
