//! SoftDevice S140 implementation of the `Central` radio seam.
//!
//! Scanning, connecting and GATT discovery go through the SoftDevice's
//! Central-role API. The relay service is discovered with a hand-written
//! `gatt_client::Client` so the write characteristic's properties are kept
//! and the session can log whether writes are advertised.

use defmt::{debug, info, warn};
use embassy_time::{Duration, Instant};
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{central, Address, AddressType, Connection, Uuid};
use nrf_softdevice::{raw, Softdevice};
use relay_panel::address::PeerAddress;
use relay_panel::ble::{Central, ScanReport};
use relay_panel::config::{
    self, BLE_MAX_DISCOVERED, RELAY_CHARACTERISTIC_UUID, RELAY_SERVICE_UUID,
};
use relay_panel::error::{CommandError, ConnectError, ScanError};

/// How long to look for the peer's advertisements when dialling (10 ms units).
const CONNECT_SCAN_TIMEOUT: u16 = 500;

/// Relay write characteristic found on a connected board.
pub struct RelayChannel {
    handle: u16,
    write: bool,
    write_without_response: bool,
}

/// Discovery state for the relay service (0xFFE0).
pub struct RelayServiceClient {
    channel: Option<RelayChannel>,
}

impl gatt_client::Client for RelayServiceClient {
    type Event = ();

    fn on_hvx(&self, _conn: &Connection, _type: HvxType, _handle: u16, _data: &[u8]) -> Option<()> {
        None
    }

    fn uuid() -> Uuid {
        Uuid::new_128(&RELAY_SERVICE_UUID.to_le_bytes())
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self { channel: None }
    }

    fn discovered_characteristic(&mut self, characteristic: &Characteristic, _descriptors: &[Descriptor]) {
        let wanted = Uuid::new_128(&RELAY_CHARACTERISTIC_UUID.to_le_bytes());
        if characteristic.uuid == Some(wanted) {
            let props = &characteristic.props;
            self.channel = Some(RelayChannel {
                handle: characteristic.handle_value,
                write: props.write() != 0,
                write_without_response: props.write_wo_resp() != 0,
            });
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        if self.channel.is_none() {
            return Err(DiscoverError::ServiceIncomplete);
        }
        Ok(())
    }
}

/// The SoftDevice in Central role.
pub struct SdCentral {
    sd: &'static Softdevice,
}

impl SdCentral {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { sd }
    }
}

impl Central for SdCentral {
    type Link = Connection;
    type Channel = RelayChannel;

    async fn scan<F>(&self, duration_secs: u64, mut on_report: F) -> Result<(), ScanError>
    where
        F: FnMut(ScanReport<'_>) -> Option<()>,
    {
        let scan_cfg = central::ScanConfig {
            // Active scan to retrieve scan-response data (device names).
            active: true,
            interval: u32::from(config::BLE_SCAN_INTERVAL),
            window: u32::from(config::BLE_SCAN_WINDOW),
            timeout: (duration_secs * 100) as u16,
            ..Default::default()
        };
        let deadline = Instant::now() + Duration::from_secs(duration_secs);

        let mut seen: Vec<Address, BLE_MAX_DISCOVERED> = Vec::new();
        let result = central::scan(self.sd, &scan_cfg, |params| {
            if Instant::now() > deadline {
                return Some(());
            }

            let address = Address::from_raw(params.peer_addr);
            if seen.contains(&address) {
                return None;
            }
            let _ = seen.push(address);

            let data =
                unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };
            on_report(ScanReport {
                address: from_sd_address(&address),
                rssi: params.rssi,
                data,
            })
        })
        .await;

        match result {
            Ok(()) | Err(central::ScanError::Timeout) => Ok(()),
            Err(e) => {
                warn!("SoftDevice scan failed: {:?}", e);
                Err(ScanError::RadioFailed)
            }
        }
    }

    async fn connect(&self, address: &PeerAddress) -> Result<Connection, ConnectError> {
        let target = to_sd_address(address);
        let whitelist = [&target];
        let conn_cfg = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                timeout: CONNECT_SCAN_TIMEOUT,
                ..Default::default()
            },
            conn_params: raw::ble_gap_conn_params_t {
                min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
                max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
                slave_latency: config::BLE_SLAVE_LATENCY,
                conn_sup_timeout: config::BLE_SUP_TIMEOUT,
            },
            ..Default::default()
        };

        central::connect(self.sd, &conn_cfg).await.map_err(|e| {
            warn!("SoftDevice connect failed: {:?}", e);
            ConnectError::LinkFailed
        })
    }

    async fn resolve(&self, link: &Connection) -> Result<RelayChannel, ConnectError> {
        info!("Discovering relay service...");
        let client: RelayServiceClient = gatt_client::discover(link).await.map_err(|e| match e {
            DiscoverError::ServiceIncomplete => ConnectError::CharacteristicMissing,
            _ => ConnectError::ServiceMissing,
        })?;
        client.channel.ok_or(ConnectError::CharacteristicMissing)
    }

    fn can_write(&self, channel: &RelayChannel) -> bool {
        channel.write || channel.write_without_response
    }

    async fn write(
        &self,
        link: &Connection,
        channel: &RelayChannel,
        data: &[u8],
    ) -> Result<(), CommandError> {
        let sent = if channel.write_without_response {
            gatt_client::write_without_response(link, channel.handle, data)
                .await
                .map_err(|e| debug!("GATT write command failed: {:?}", e))
        } else {
            // Also taken when no write property is advertised.
            gatt_client::write(link, channel.handle, data)
                .await
                .map_err(|e| debug!("GATT write request failed: {:?}", e))
        };
        sent.map_err(|()| CommandError::WriteFailed)
    }

    fn is_connected(&self, link: &Connection) -> bool {
        link.is_connected()
    }

    fn release(&self, link: Connection) {
        if link.disconnect().is_err() {
            debug!("Link already closed");
        }
    }
}

/// SoftDevice addresses are little-endian; `PeerAddress` is display order.
fn from_sd_address(address: &Address) -> PeerAddress {
    let mut bytes = address.bytes();
    bytes.reverse();
    PeerAddress::new(bytes)
}

fn to_sd_address(address: &PeerAddress) -> Address {
    let mut bytes = address.bytes();
    // Random static addresses have the two top bits of the MSB set.
    let kind = if bytes[0] & 0xC0 == 0xC0 {
        AddressType::RandomStatic
    } else {
        AddressType::Public
    };
    bytes.reverse();
    Address::new(kind, bytes)
}
