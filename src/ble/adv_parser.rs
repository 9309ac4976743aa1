use crate::ble::{peer_name, PeerName};

/// AD types carrying the shortened / complete local name.
const AD_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Name shown for peers that do not advertise one.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Extract the local name from advertisement data, if present and non-empty.
pub fn find_device_name(data: &[u8]) -> Option<PeerName> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_SHORTENED_LOCAL_NAME || ad_type == AD_COMPLETE_LOCAL_NAME {
            let name_bytes = &data[i + 2..i + 1 + len];
            let mut name = PeerName::new();
            for &b in name_bytes {
                if name.push(b as char).is_err() {
                    break;
                }
            }
            return (!name.is_empty()).then_some(name);
        }
        i += len + 1;
    }
    None
}

/// Local name from advertisement data, or `"Unknown Device"`.
pub fn extract_device_name(data: &[u8]) -> PeerName {
    find_device_name(data).unwrap_or_else(|| peer_name(UNKNOWN_DEVICE_NAME))
}
