use std::io;
use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{debug, info};
use windows_sys::core::GUID;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Networking::WinSock::{
    closesocket, connect, WSACloseEvent, WSACreateEvent, WSAGetLastError,
    WSAGetOverlappedResult, WSARecv, WSASend, WSASocketW, WSAStartup,
    WSAWaitForMultipleEvents, INVALID_SOCKET, SOCKADDR, SOCKET, SOCKET_ERROR, SOCK_STREAM,
    WSABUF, WSADATA, WSA_FLAG_OVERLAPPED, WSA_IO_PENDING, WSA_WAIT_TIMEOUT,
};
use windows_sys::Win32::System::IO::{CancelIoEx, OVERLAPPED};

use super::sliced::SlicedReader;
use super::{DeviceAddress, Transport};
use crate::error::{Error, Result};
use crate::protocol::hex;

// Winsock Bluetooth constants (from ws2bth.h)
const AF_BTH: u16 = 32;
const BTHPROTO_RFCOMM: i32 = 3;

const TRUE: i32 = 1;
const FALSE: i32 = 0;

/// Serial Port Profile service class.
const SPP_SERVICE_CLASS: GUID = GUID::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// How long one overlapped read may stay pending before it is cancelled
/// and reissued.
const RECV_SLICE_MS: u32 = 250;

/// SOCKADDR_BTH (from ws2bth.h, 1-byte packed)
#[repr(C, packed(1))]
struct SockaddrBth {
    address_family: u16,
    bt_addr: u64,
    service_class_id: GUID,
    port: u32,
}

/// RFCOMM connection over a Winsock AF_BTH socket.
/// All I/O is overlapped but awaited to completion on a blocking thread.
pub struct WinRfcommConnection {
    address: DeviceAddress,
    socket: Option<SOCKET>,
    reader: SlicedReader,
}

fn last_wsa_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { WSAGetLastError() })
}

fn wsa_startup() -> io::Result<()> {
    static STARTUP: OnceLock<i32> = OnceLock::new();
    let ret = *STARTUP.get_or_init(|| unsafe {
        let mut data: WSADATA = std::mem::zeroed();
        WSAStartup(0x0202, &mut data)
    });
    if ret != 0 {
        return Err(io::Error::from_raw_os_error(ret));
    }
    Ok(())
}

fn open_blocking(address: DeviceAddress, channel: u8) -> io::Result<SOCKET> {
    wsa_startup()?;

    unsafe {
        let socket = WSASocketW(
            AF_BTH as i32,
            SOCK_STREAM,
            BTHPROTO_RFCOMM,
            std::ptr::null(),
            0,
            WSA_FLAG_OVERLAPPED,
        );
        if socket == INVALID_SOCKET {
            return Err(last_wsa_error());
        }

        let addr = SockaddrBth {
            address_family: AF_BTH,
            bt_addr: address.to_bth_addr(),
            service_class_id: SPP_SERVICE_CLASS,
            port: u32::from(channel),
        };

        let ret = connect(
            socket,
            &addr as *const _ as *const SOCKADDR,
            std::mem::size_of::<SockaddrBth>() as i32,
        );
        if ret == SOCKET_ERROR {
            let err = last_wsa_error();
            closesocket(socket);
            return Err(err);
        }

        Ok(socket)
    }
}

/// Manual-reset event for one overlapped operation, closed on drop.
struct WsaEvent(HANDLE);

impl WsaEvent {
    fn new() -> io::Result<Self> {
        let handle = unsafe { WSACreateEvent() };
        if handle.is_null() {
            return Err(last_wsa_error());
        }
        Ok(Self(handle))
    }
}

impl Drop for WsaEvent {
    fn drop(&mut self) {
        unsafe {
            WSACloseEvent(self.0);
        }
    }
}

/// One overlapped WSASend awaited to completion. Returns bytes accepted.
fn send_once(socket: SOCKET, data: &[u8]) -> io::Result<usize> {
    let event = WsaEvent::new()?;
    unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        overlapped.hEvent = event.0;
        let buf = WSABUF {
            len: data.len() as u32,
            buf: data.as_ptr() as *mut u8,
        };
        let mut sent = 0u32;
        let ret = WSASend(socket, &buf, 1, &mut sent, 0, &mut overlapped, None);
        if ret == SOCKET_ERROR {
            let err = WSAGetLastError();
            if err != WSA_IO_PENDING {
                return Err(io::Error::from_raw_os_error(err));
            }
        }

        let mut flags = 0u32;
        if WSAGetOverlappedResult(socket, &overlapped, &mut sent, TRUE, &mut flags) == FALSE {
            return Err(last_wsa_error());
        }
        Ok(sent as usize)
    }
}

fn send_blocking(socket: SOCKET, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let n = send_once(socket, &data[offset..])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "RFCOMM socket accepted no bytes",
            ));
        }
        offset += n;
    }
    Ok(())
}

/// One overlapped WSARecv, waited on for at most `RECV_SLICE_MS`.
/// `Ok(None)` means nothing arrived and the read was cancelled.
fn recv_slice(socket: SOCKET, max_bytes: usize) -> io::Result<Option<Vec<u8>>> {
    let event = WsaEvent::new()?;
    let mut buf = vec![0u8; max_bytes];
    unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        overlapped.hEvent = event.0;
        let wsa_buf = WSABUF {
            len: buf.len() as u32,
            buf: buf.as_mut_ptr(),
        };
        let mut received = 0u32;
        let mut flags = 0u32;
        let ret = WSARecv(
            socket,
            &wsa_buf,
            1,
            &mut received,
            &mut flags,
            &mut overlapped,
            None,
        );
        if ret == SOCKET_ERROR {
            let err = WSAGetLastError();
            if err != WSA_IO_PENDING {
                return Err(io::Error::from_raw_os_error(err));
            }
        }

        let wait = WSAWaitForMultipleEvents(1, &event.0, TRUE, RECV_SLICE_MS, FALSE);
        let timed_out = wait == WSA_WAIT_TIMEOUT;
        if timed_out {
            CancelIoEx(socket as HANDLE, &overlapped);
        }

        // Always wait for the kernel to let go of the buffer
        let done = WSAGetOverlappedResult(socket, &overlapped, &mut received, TRUE, &mut flags);
        if done == FALSE {
            if timed_out {
                return Ok(None);
            }
            return Err(last_wsa_error());
        }
        if received == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "RFCOMM connection closed by speaker",
            ));
        }
        buf.truncate(received as usize);
        Ok(Some(buf))
    }
}

impl WinRfcommConnection {
    fn socket(&self) -> Result<SOCKET> {
        self.socket.ok_or_else(Error::closed)
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        .map_err(Error::Transport)
}

#[async_trait]
impl Transport for WinRfcommConnection {
    async fn connect(address: DeviceAddress, channel: u8) -> Result<Self> {
        info!("Connecting to {} on RFCOMM channel {}", address, channel);

        let socket = blocking(move || open_blocking(address, channel))
            .await
            .map_err(|e| Error::Connection {
                address: address.to_string(),
                channel,
                source: match e {
                    Error::Transport(source) => source,
                    other => io::Error::new(io::ErrorKind::Other, other.to_string()),
                },
            })?;

        info!("Connected to {} on RFCOMM channel {}", address, channel);
        Ok(Self {
            address,
            socket: Some(socket),
            reader: SlicedReader::new(),
        })
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket()?;
        debug!("TX: {}", hex::encode(data));
        let data = data.to_vec();
        blocking(move || send_blocking(socket, &data)).await
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let socket = self.socket()?;
        // A slice left running by a dropped receive is collected here first
        let data = self
            .reader
            .read(max_bytes, move |n| recv_slice(socket, n))
            .await?;
        debug!("RX: {}", hex::encode(&data));
        Ok(data)
    }

    async fn close(&mut self) -> Result<()> {
        let socket = self.socket.take().ok_or_else(Error::closed)?;
        self.reader.reset();
        if unsafe { closesocket(socket) } == SOCKET_ERROR {
            return Err(Error::Transport(last_wsa_error()));
        }
        info!("Closed RFCOMM connection to {}", self.address);
        Ok(())
    }
}

impl Drop for WinRfcommConnection {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            unsafe {
                closesocket(socket);
            }
        }
    }
}
