//! Decoders for replies the speaker sends back on the RFCOMM stream.
//!
//! The stream may carry unsolicited frames between a request and its reply,
//! so decoders return `None` for anything that does not match instead of
//! failing; the caller keeps reading.

use super::commands::*;

/// `EF A0 14 01 <percent>`
pub const BATTERY_REPLY_SIGNATURE: [u8; 4] = [FRAME_START, CATEGORY_QUERY, OP_BATTERY_LEVEL, 0x01];

/// `EF A0 10 <len> <name...>`
pub const FIRMWARE_REPLY_SIGNATURE: [u8; 3] = [FRAME_START, CATEGORY_QUERY, OP_FIRMWARE_NAME];

/// Receive buffer size for a battery reply.
pub const BATTERY_REPLY_SIZE: usize = 7;

/// Receive buffer size for a firmware name reply.
pub const FIRMWARE_REPLY_SIZE: usize = 128;

/// Battery percentage from a battery reply. The value is not range-checked.
pub fn decode_battery_reply(data: &[u8]) -> Option<u8> {
    if data.len() < 5 || data[..4] != BATTERY_REPLY_SIGNATURE {
        return None;
    }
    Some(data[4])
}

/// Firmware package name from a firmware reply.
pub fn decode_firmware_reply(data: &[u8]) -> Option<String> {
    if data.len() < 5 || data[..3] != FIRMWARE_REPLY_SIGNATURE {
        return None;
    }

    let length = data[3] as usize;
    let name = data.get(4..4 + length)?;
    Some(String::from_utf8_lossy(name).into_owned())
}
