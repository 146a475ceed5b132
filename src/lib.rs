//! Control client for EarFun UBOOM X speakers over Bluetooth RFCOMM.

pub mod bluetooth;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;

pub use bluetooth::{DeviceAddress, Transport};
pub use device::SpeakerClient;
pub use error::{Error, Result};
