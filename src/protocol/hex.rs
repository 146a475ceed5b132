//! Hex helpers for the ASCII form of frames (avoids an extra dependency).

use crate::error::{Error, Result};

pub fn encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode a hex string, accepting either case.
pub fn decode(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(Error::Encoding(format!("odd length {} in {:?}", s.len(), s)));
    }

    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = nibble(pair[0]);
            let lo = nibble(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(Error::Encoding(format!(
                    "invalid hex digit in {:?}",
                    String::from_utf8_lossy(pair)
                ))),
            }
        })
        .collect()
}

pub fn is_valid(s: &str) -> bool {
    decode(s).is_ok()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
