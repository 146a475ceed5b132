use std::io;
use std::os::fd::{FromRawFd, OwnedFd};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info};

use super::{DeviceAddress, Transport};
use crate::error::{Error, Result};
use crate::protocol::hex;

// Bluetooth socket constants (from Linux kernel headers)
const AF_BLUETOOTH: libc::c_int = 31;
const BTPROTO_RFCOMM: libc::c_int = 3;

/// Send/receive timeout applied to the socket while connecting.
const CONNECT_IO_TIMEOUT_SECS: libc::time_t = 5;

/// sockaddr_rc — RFCOMM socket address (from <bluetooth/rfcomm.h>)
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6], // Bluetooth address in little-endian
    rc_channel: u8,
}

/// RFCOMM connection over a BlueZ socket.
/// Connects with a blocking socket, then switches to non-blocking mode and
/// lets tokio drive reads and writes.
pub struct RfcommConnection {
    address: DeviceAddress,
    stream: Option<UnixStream>,
}

impl RfcommConnection {
    fn stream(&mut self) -> Result<&mut UnixStream> {
        self.stream.as_mut().ok_or_else(Error::closed)
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }
}

/// Create the socket and run the blocking RFCOMM connect.
fn open_blocking(address: DeviceAddress, channel: u8) -> io::Result<OwnedFd> {
    unsafe {
        let fd = libc::socket(AF_BLUETOOTH, libc::SOCK_STREAM, BTPROTO_RFCOMM);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owned from here on so every early return closes it
        let owned = OwnedFd::from_raw_fd(fd);

        let timeout = libc::timeval {
            tv_sec: CONNECT_IO_TIMEOUT_SECS,
            tv_usec: 0,
        };
        for opt in [libc::SO_SNDTIMEO, libc::SO_RCVTIMEO] {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &timeout as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            );
        }

        let addr = SockaddrRc {
            rc_family: AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: address.to_posix_bytes(),
            rc_channel: channel,
        };

        // Blocking connect: waits for the RFCOMM DLC handshake
        let ret = libc::connect(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
        );
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(owned)
    }
}

#[async_trait]
impl Transport for RfcommConnection {
    async fn connect(address: DeviceAddress, channel: u8) -> Result<Self> {
        info!("Connecting to {} on RFCOMM channel {}", address, channel);

        let connect_error = |source: io::Error| Error::Connection {
            address: address.to_string(),
            channel,
            source,
        };

        let fd = tokio::task::spawn_blocking(move || open_blocking(address, channel))
            .await
            .map_err(|e| connect_error(io::Error::new(io::ErrorKind::Other, e)))?
            .map_err(connect_error)?;

        // UnixStream only needs a connected stream socket underneath
        let std_stream = std::os::unix::net::UnixStream::from(fd);
        let stream = UnixStream::from_std(std_stream).map_err(connect_error)?;

        info!("Connected to {} on RFCOMM channel {}", address, channel);
        Ok(Self {
            address,
            stream: Some(stream),
        })
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        debug!("TX: {}", hex::encode(data));
        let stream = self.stream()?;
        // write_all retries short writes until the whole frame is accepted
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let stream = self.stream()?;
        let mut buf = vec![0u8; max_bytes];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            info!("RFCOMM connection closed (EOF)");
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "RFCOMM connection closed by speaker",
            )));
        }
        buf.truncate(n);
        debug!("RX: {}", hex::encode(&buf));
        Ok(buf)
    }

    async fn close(&mut self) -> Result<()> {
        let mut stream = self.stream.take().ok_or_else(Error::closed)?;
        let shutdown = stream.shutdown().await;
        // The fd is released here whether or not shutdown succeeded
        drop(stream);
        info!("Closed RFCOMM connection to {}", self.address);
        shutdown.map_err(Error::Transport)
    }
}
