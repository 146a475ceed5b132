pub mod address;
#[cfg(unix)]
pub mod connection;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(any(windows, test))]
pub(crate) mod sliced;
#[cfg(windows)]
pub mod windows;

use async_trait::async_trait;

use crate::error::Result;
pub use address::DeviceAddress;

/// RFCOMM transport for the platform this crate is built for.
#[cfg(unix)]
pub type PlatformTransport = connection::RfcommConnection;
#[cfg(windows)]
pub type PlatformTransport = windows::WinRfcommConnection;

/// Byte stream to the speaker.
///
/// One value owns one OS socket. No buffering or frame reassembly happens
/// here; `receive` hands back whatever a single read delivered. After
/// `close`, every call (including a second `close`) fails with a
/// `Transport` error of kind `NotConnected`.
#[async_trait]
pub trait Transport: Send + Sized {
    /// Open an RFCOMM stream to `address` on `channel`.
    async fn connect(address: DeviceAddress, channel: u8) -> Result<Self>;

    /// Write the whole buffer.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read at most `max_bytes`. Returns at least one byte; end of stream is
    /// reported as an `UnexpectedEof` transport error.
    async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Release the socket.
    async fn close(&mut self) -> Result<()>;
}
