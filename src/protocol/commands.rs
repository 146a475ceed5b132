//! Opcodes and lookup tables for the UBOOM X speaker protocol.
//! Frame format: [0xEF] [category] [opcode] [payload...] [0xFE].

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub const FRAME_START: u8 = 0xEF;
pub const FRAME_END: u8 = 0xFE;

// Categories
pub const CATEGORY_QUERY: u8 = 0xA0;
pub const CATEGORY_SETTING: u8 = 0xB0;

// Queries (category 0xA0); replies echo the opcode
pub const OP_FIRMWARE_NAME: u8 = 0x10;
pub const OP_BATTERY_LEVEL: u8 = 0x14;

// Settings (category 0xB0)
pub const OP_POWER_OFF: u8 = 0x25;
pub const OP_PAIRING: u8 = 0x35;
pub const OP_CUSTOM_EQ: u8 = 0x45;
pub const OP_EQ_MODE: u8 = 0x46;
pub const OP_BEEP_VOLUME: u8 = 0x65;
pub const OP_SHUTDOWN_TIMEOUT: u8 = 0x75;
pub const OP_LIGHTS: u8 = 0x95;

/// Value byte of the power-off setting.
pub const POWER_OFF_CODE: u8 = 0x01;

/// RFCOMM channel the speaker listens on.
pub const RFCOMM_CHANNEL: u8 = 2;

/// Light sub-mode flags inside the lights payload.
pub const LIGHT_SOLID: u8 = 0x01;
pub const LIGHT_DANCING: u8 = 0x02;

/// Oluv's EQ modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqMode {
    Studio = 1,
    Indoor = 2,
    IndoorPlus = 3,
    Outdoor = 4,
    OutdoorPlus = 5,
    Boom = 6,
    Ground = 7,
}

impl EqMode {
    pub const ALL: [EqMode; 7] = [
        Self::Studio,
        Self::Indoor,
        Self::IndoorPlus,
        Self::Outdoor,
        Self::OutdoorPlus,
        Self::Boom,
        Self::Ground,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::Indoor => "indoor",
            Self::IndoorPlus => "indoor+",
            Self::Outdoor => "outdoor",
            Self::OutdoorPlus => "outdoor+",
            Self::Boom => "boom",
            Self::Ground => "ground",
        }
    }
}

impl FromStr for EqMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::invalid(format!("unknown EQ mode: {s}")))
    }
}

/// Light actions with a fixed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedLight {
    Default,
    Off,
}

impl NamedLight {
    pub const ALL: [NamedLight; 2] = [Self::Default, Self::Off];

    pub fn payload(self) -> [u8; 6] {
        match self {
            Self::Default => [0x04, 0x00, 0x00, 0x00, 0x00, 0x00],
            Self::Off => [0x04, 0x01, 0x00, 0x00, 0x00, 0x00],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Off => "off",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

/// Auto-shutdown timeouts, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownTimeout {
    Minutes5,
    Minutes10,
    Minutes30,
    Minutes60,
    Minutes90,
    Minutes120,
    Never,
}

impl ShutdownTimeout {
    pub const ALL: [ShutdownTimeout; 7] = [
        Self::Minutes5,
        Self::Minutes10,
        Self::Minutes30,
        Self::Minutes60,
        Self::Minutes90,
        Self::Minutes120,
        Self::Never,
    ];

    pub fn code(self) -> u8 {
        match self {
            Self::Minutes5 => 0x01,
            Self::Minutes10 => 0x02,
            Self::Minutes30 => 0x03,
            Self::Minutes60 => 0x04,
            Self::Minutes90 => 0x05,
            Self::Minutes120 => 0x06,
            Self::Never => 0xFF,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minutes5 => "5m",
            Self::Minutes10 => "10m",
            Self::Minutes30 => "30m",
            Self::Minutes60 => "60m",
            Self::Minutes90 => "90m",
            Self::Minutes120 => "120m",
            Self::Never => "no",
        }
    }

    /// Timeout for a slider position (0 = 5m ... 6 = no).
    pub fn from_step(step: usize) -> Option<Self> {
        Self::ALL.get(step).copied()
    }
}

impl FromStr for ShutdownTimeout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid(format!("unknown shutdown timeout: {s}")))
    }
}

/// Bluetooth pairing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingMode {
    Off = 0,
    On = 1,
}

impl PairingMode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }
}

impl FromStr for PairingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(Error::invalid(format!("unknown pairing mode: {s}"))),
        }
    }
}

/// Beep (prompt tone) volume levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeepVolume {
    V0 = 1,
    V25 = 2,
    V50 = 3,
    V75 = 4,
    V100 = 5,
}

impl BeepVolume {
    pub const ALL: [BeepVolume; 5] = [Self::V0, Self::V25, Self::V50, Self::V75, Self::V100];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Volume in percent.
    pub fn level(self) -> u8 {
        (self.code() - 1) * 25
    }

    /// Volume for a slider position; each step is 25%.
    pub fn from_step(step: usize) -> Option<Self> {
        Self::ALL.get(step).copied()
    }
}

impl TryFrom<i32> for BeepVolume {
    type Error = Error;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|v| i32::from(v.level()) == level)
            .ok_or_else(|| Error::invalid(format!("invalid beep volume level: {level}")))
    }
}

impl FromStr for BeepVolume {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: i32 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid(format!("invalid beep volume level: {s}")))?;
        Self::try_from(level)
    }
}

macro_rules! display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(EqMode, NamedLight, ShutdownTimeout, PairingMode);

impl fmt::Display for BeepVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}
