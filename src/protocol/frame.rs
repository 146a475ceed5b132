use std::fmt;
use std::str::FromStr;

use super::commands::*;
use super::hex;
use crate::error::{Error, Result};

/// Number of bands in a custom EQ curve.
pub const EQ_BAND_COUNT: usize = 10;

/// Raw band value for -10 dB.
pub const MIN_BAND_VALUE: u8 = 0;
/// Raw band value for +10 dB.
pub const MAX_BAND_VALUE: u8 = 120;

/// A speaker protocol frame.
///
/// Wire format:
/// ```text
/// [0xEF] [category] [opcode] [payload...] [0xFE]
/// ```
///
/// Single-value settings use the payload `[0x01] [value] [value + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub category: u8,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(category: u8, opcode: u8, payload: Vec<u8>) -> Self {
        Self {
            category,
            opcode,
            payload,
        }
    }

    /// Build a single-value setting frame.
    pub fn setting(opcode: u8, value: u8) -> Self {
        Self::new(
            CATEGORY_SETTING,
            opcode,
            vec![0x01, value, value.wrapping_add(1)],
        )
    }

    /// Build a query request frame.
    pub fn query(opcode: u8) -> Self {
        Self::new(CATEGORY_QUERY, opcode, vec![0x00, 0x00])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(4 + self.payload.len());
        result.push(FRAME_START);
        result.push(self.category);
        result.push(self.opcode);
        result.extend_from_slice(&self.payload);
        result.push(FRAME_END);
        result
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.to_bytes())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cat={:02X} op={:02X}", self.category, self.opcode)?;
        if !self.payload.is_empty() {
            write!(f, " payload={}", hex::encode(&self.payload))?;
        }
        Ok(())
    }
}

/// A custom EQ curve: ten raw band values, 0 (-10 dB) to 120 (+10 dB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqBands([u8; EQ_BAND_COUNT]);

impl EqBands {
    /// Validate band count and range.
    pub fn new(values: &[i32]) -> Result<Self> {
        if values.len() != EQ_BAND_COUNT {
            return Err(Error::invalid(format!(
                "invalid number of EQ bands: {}, must be exactly {}",
                values.len(),
                EQ_BAND_COUNT
            )));
        }

        let mut bands = [0u8; EQ_BAND_COUNT];
        for (band, &value) in bands.iter_mut().zip(values) {
            *band = check_band(value)?;
        }
        Ok(Self(bands))
    }

    /// Build from slider positions in `[0, 1]` where 0 is the top (+10 dB).
    pub fn from_slider_positions(positions: &[f32]) -> Result<Self> {
        let mut values = Vec::with_capacity(positions.len());
        for &pos in positions {
            if !(0.0..=1.0).contains(&pos) {
                return Err(Error::invalid(format!(
                    "EQ slider position out of range: {pos}"
                )));
            }
            values.push(((1.0 - pos) * f32::from(MAX_BAND_VALUE)) as i32);
        }
        Self::new(&values)
    }

    /// Inverse of [`EqBands::from_slider_positions`].
    pub fn slider_positions(&self) -> [f32; EQ_BAND_COUNT] {
        self.0
            .map(|raw| 1.0 - f32::from(raw) / f32::from(MAX_BAND_VALUE))
    }

    /// Band gains in dB (6 raw steps per dB).
    pub fn gains_db(&self) -> [f32; EQ_BAND_COUNT] {
        self.0.map(|raw| f32::from(raw) / 6.0 - 10.0)
    }

    pub fn values(&self) -> &[u8; EQ_BAND_COUNT] {
        &self.0
    }
}

fn check_band(value: i32) -> Result<u8> {
    if value < i32::from(MIN_BAND_VALUE) || value > i32::from(MAX_BAND_VALUE) {
        return Err(Error::invalid(format!(
            "EQ band value {value} must be between {MIN_BAND_VALUE} (-10 dB) and {MAX_BAND_VALUE} (+10 dB)"
        )));
    }
    Ok(value as u8)
}

/// Parse 10 comma-separated band values, e.g. `"0,0,0,0,0,0,0,0,0,0"`.
impl FromStr for EqBands {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|token| {
                let token = token.trim();
                token
                    .parse::<i64>()
                    .map_err(|_| Error::invalid(format!("invalid EQ band value: {token:?}")))
                    .map(|v| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(&values)
    }
}

impl fmt::Display for EqBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        f.write_str(&values.join(","))
    }
}

/// What to do with the speaker lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    Named(NamedLight),
    /// A fixed color; `solid` = steady, otherwise the lights dance to the music.
    Rgb { rgb: [u8; 3], solid: bool },
}

impl LightAction {
    /// Parse a named action or a 6-digit RGB hex value.
    /// `solid` only applies to colors.
    pub fn parse(action: &str, solid: bool) -> Result<Self> {
        if let Some(named) = NamedLight::from_name(action) {
            return Ok(Self::Named(named));
        }

        if action.len() == 6 {
            if let Ok(bytes) = hex::decode(action) {
                return Ok(Self::Rgb {
                    rgb: [bytes[0], bytes[1], bytes[2]],
                    solid,
                });
            }
        }

        Err(Error::invalid(format!(
            "invalid light action or RGB value: {action}"
        )))
    }

    fn payload(&self) -> Vec<u8> {
        match *self {
            Self::Named(named) => named.payload().to_vec(),
            Self::Rgb { rgb, solid } => {
                let mode = if solid { LIGHT_SOLID } else { LIGHT_DANCING };
                vec![0x04, mode, rgb[0], rgb[1], rgb[2], 0x00]
            }
        }
    }
}

/// One speaker operation with its validated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetEq(EqBands),
    SetMode(EqMode),
    Light(LightAction),
    ShutdownTimeout(ShutdownTimeout),
    PowerOff,
    Pairing(PairingMode),
    BeepVolume(BeepVolume),
    /// Pre-encoded bytes, sent as-is.
    Raw(Vec<u8>),
    BatteryLevel,
    FirmwareName,
}

impl Command {
    /// Build a raw command from its hex form.
    pub fn raw(hex_msg: &str) -> Result<Self> {
        let bytes = hex::decode(hex_msg.trim())?;
        if bytes.is_empty() {
            return Err(Error::invalid("raw message is empty"));
        }
        Ok(Self::Raw(bytes))
    }

    /// The frame for this command; `None` for raw bytes.
    pub fn frame(&self) -> Option<Frame> {
        let frame = match self {
            Self::SetEq(bands) => {
                let mut payload = Vec::with_capacity(EQ_BAND_COUNT + 3);
                payload.push(0x0B);
                payload.push(0x01);
                payload.extend_from_slice(bands.values());
                payload.push(0x00);
                Frame::new(CATEGORY_SETTING, OP_CUSTOM_EQ, payload)
            }
            Self::SetMode(mode) => Frame::setting(OP_EQ_MODE, mode.code()),
            Self::Light(action) => Frame::new(CATEGORY_SETTING, OP_LIGHTS, action.payload()),
            Self::ShutdownTimeout(t) => Frame::setting(OP_SHUTDOWN_TIMEOUT, t.code()),
            Self::PowerOff => Frame::setting(OP_POWER_OFF, POWER_OFF_CODE),
            Self::Pairing(mode) => Frame::setting(OP_PAIRING, mode.code()),
            Self::BeepVolume(volume) => Frame::setting(OP_BEEP_VOLUME, volume.code()),
            Self::BatteryLevel => Frame::query(OP_BATTERY_LEVEL),
            Self::FirmwareName => Frame::query(OP_FIRMWARE_NAME),
            Self::Raw(_) => return None,
        };
        Some(frame)
    }

    /// Bytes to put on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes.clone(),
            _ => self.frame().map(|f| f.to_bytes()).unwrap_or_default(),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.encode())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetEq(_) => "set_eq",
            Self::SetMode(_) => "set_mode",
            Self::Light(_) => "light_action",
            Self::ShutdownTimeout(_) => "shutdown_timeout",
            Self::PowerOff => "power_off",
            Self::Pairing(_) => "pairing",
            Self::BeepVolume(_) => "beep_volume",
            Self::Raw(_) => "raw",
            Self::BatteryLevel => "battery_level",
            Self::FirmwareName => "firmware_name",
        }
    }
}
