use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// OUI the speaker shows up under when scanned on Windows.
pub const SCAN_OUI: [u8; 3] = [0xC7, 0xAB, 0xE5];
/// OUI the speaker's RFCOMM service is reachable under.
pub const SERVICE_OUI: [u8; 3] = [0xF8, 0xAB, 0xE5];

/// A Bluetooth device address, stored in display (big-endian) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(pub [u8; 6]);

impl DeviceAddress {
    /// Byte order for BlueZ `sockaddr_rc` (little-endian).
    pub fn to_posix_bytes(self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Packed 48-bit value for Winsock `SOCKADDR_BTH`.
    pub fn to_bth_addr(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    pub fn oui(self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Map the address reported by a Windows scan onto the one the
    /// speaker accepts RFCOMM connections on. Other addresses are unchanged.
    pub fn with_service_oui(self) -> Self {
        if self.oui() != SCAN_OUI {
            return self;
        }
        let mut bytes = self.0;
        bytes[..3].copy_from_slice(&SERVICE_OUI);
        Self(bytes)
    }
}

impl FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid(format!("invalid Bluetooth address: {s:?}"));

        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}
