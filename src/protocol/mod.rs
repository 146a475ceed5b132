pub mod commands;
pub mod frame;
pub mod hex;
pub mod reply;

pub use commands::{BeepVolume, EqMode, NamedLight, PairingMode, ShutdownTimeout, RFCOMM_CHANNEL};
pub use frame::{Command, EqBands, Frame, LightAction};
pub use reply::{decode_battery_reply, decode_firmware_reply};
