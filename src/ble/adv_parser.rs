use heapless::String;

/// AD type: incomplete list of 16-bit service UUIDs.
pub const AD_UUID16_SOME: u8 = 0x02;
/// AD type: complete list of 16-bit service UUIDs.
pub const AD_UUID16_ALL: u8 = 0x03;
/// AD type: shortened local name.
pub const AD_NAME_SHORTENED: u8 = 0x08;
/// AD type: complete local name.
pub const AD_NAME_COMPLETE: u8 = 0x09;

/// Advertising PDU: connectable undirected.
pub const ADV_IND: u8 = 0x00;
/// Advertising PDU: connectable directed.
pub const ADV_DIRECT_IND: u8 = 0x01;
/// Advertising PDU: scannable undirected.
pub const ADV_SCAN_IND: u8 = 0x02;
/// Advertising PDU: non-connectable undirected.
pub const ADV_NONCONN_IND: u8 = 0x03;
/// Scan response.
pub const SCAN_RSP: u8 = 0x04;

/// Only connectable reports are worth inspecting.
pub fn is_connectable(adv_type: u8) -> bool {
    adv_type == ADV_IND || adv_type == ADV_DIRECT_IND
}

/// Check if raw advertisement data lists `uuid` among its 16-bit service UUIDs.
///
/// UUID lists with an odd payload length are malformed and skipped; the
/// search continues with the next AD structure.
pub fn contains_service_uuid(data: &[u8], uuid: u16) -> bool {
    let uuid_le = uuid.to_le_bytes();

    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_UUID16_SOME || ad_type == AD_UUID16_ALL {
            let uuid_data = &data[i + 2..i + 1 + len];
            if uuid_data.len() % 2 != 0 {
                debug!("adv: malformed UUID16 list (len {})", uuid_data.len());
            } else if uuid_data.chunks_exact(2).any(|chunk| chunk == uuid_le) {
                return true;
            }
        }
        i += len + 1;
    }
    false
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_NAME_SHORTENED || ad_type == AD_NAME_COMPLETE {
            let name_bytes = &data[i + 2..i + 1 + len];
            let mut name = String::new();
            for &b in name_bytes {
                if name.push(b as char).is_err() {
                    break;
                }
            }
            return name;
        }
        i += len + 1;
    }

    let mut s = String::new();
    let _ = s.push_str("Unknown");
    s
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
