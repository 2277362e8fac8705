//! # Bluetooth RFCOMM Transport
//!
//! Classic Bluetooth (SPP) link to the printer over a raw
//! `AF_BLUETOOTH / SOCK_STREAM / BTPROTO_RFCOMM` socket.
//!
//! The socket is non-blocking and driven by tokio through
//! [`tokio::io::unix::AsyncFd`], so a pending receive never ties up a
//! runtime thread and shutting the socket down wakes the reader at once.
//!
//! ## Setup (Linux)
//!
//! The printer must be paired first; no `rfcomm bind` is needed:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# pair AA:BB:CC:DD:EE:FF
//! [bluetooth]# trust AA:BB:CC:DD:EE:FF
//! ```
//!
//! Other platforms report [`FicheroError::TransportUnavailable`].

#[cfg(not(target_os = "linux"))]
use async_trait::async_trait;

#[cfg(not(target_os = "linux"))]
use super::{NotifyCallback, Transport, TransportKind};
use crate::error::{FicheroError, Result};
use crate::printer::PrinterConfig;

/// RFCOMM channel used by the printer's serial port profile.
pub const DEFAULT_CHANNEL: u8 = PrinterConfig::D11S.rfcomm_channel;

/// Parse "XX:XX:XX:XX:XX:XX" into the 6-byte `bdaddr_t` layout.
/// BlueZ stores addresses least significant byte first.
pub fn parse_bdaddr(addr: &str) -> Result<[u8; 6]> {
    if !super::is_valid_mac(addr) {
        return Err(FicheroError::InvalidCommand(format!(
            "invalid Bluetooth address: {addr}"
        )));
    }
    let mut bdaddr = [0u8; 6];
    for (i, part) in addr.split(':').enumerate() {
        bdaddr[5 - i] = u8::from_str_radix(part, 16).map_err(|_| {
            FicheroError::InvalidCommand(format!("invalid Bluetooth address byte: {part}"))
        })?;
    }
    Ok(bdaddr)
}

#[cfg(target_os = "linux")]
pub use linux::RfcommTransport;

#[cfg(target_os = "linux")]
mod linux {
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use log::{debug, info, warn};
    use tokio::io::unix::AsyncFd;
    use tokio::task::JoinHandle;

    use super::parse_bdaddr;
    use crate::error::{FicheroError, Result};
    use crate::transport::{CONNECT_TIMEOUT, Notification, NotifyCallback, Transport, TransportKind};

    // From <bluetooth/bluetooth.h> and <bluetooth/rfcomm.h>
    const AF_BLUETOOTH: libc::c_int = 31;
    const BTPROTO_RFCOMM: libc::c_int = 3;

    /// Bytes requested per `recv`.
    const READ_SIZE: usize = 1024;

    /// sockaddr_rc structure for RFCOMM connections.
    #[repr(C)]
    struct SockaddrRc {
        rc_family: libc::sa_family_t,
        rc_bdaddr: [u8; 6],
        rc_channel: u8,
    }

    /// A connected RFCOMM socket.
    pub struct RfcommTransport {
        address: String,
        socket: Arc<AsyncFd<OwnedFd>>,
        reader: Mutex<Option<JoinHandle<()>>>,
        subscriber: Mutex<Option<NotifyCallback>>,
        closed: AtomicBool,
    }

    impl RfcommTransport {
        /// Connect to `address` on `channel`, giving up after
        /// [`CONNECT_TIMEOUT`]. The socket is closed on every failure path.
        pub async fn connect(address: &str, channel: u8) -> Result<Self> {
            let bdaddr = parse_bdaddr(address)?;

            let raw = unsafe {
                libc::socket(
                    AF_BLUETOOTH,
                    libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                    BTPROTO_RFCOMM,
                )
            };
            if raw < 0 {
                let err = io::Error::last_os_error();
                return Err(match err.raw_os_error() {
                    Some(libc::EAFNOSUPPORT) | Some(libc::EPROTONOSUPPORT) => {
                        FicheroError::TransportUnavailable(format!(
                            "RFCOMM sockets are not supported by this kernel: {err}"
                        ))
                    }
                    _ => FicheroError::ConnectFailure(format!("socket(): {err}")),
                });
            }
            // Owned from here on: dropping it closes the socket.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let sa = SockaddrRc {
                rc_family: AF_BLUETOOTH as libc::sa_family_t,
                rc_bdaddr: bdaddr,
                rc_channel: channel,
            };
            let ret = unsafe {
                libc::connect(
                    fd.as_raw_fd(),
                    &sa as *const SockaddrRc as *const libc::sockaddr,
                    std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
                )
            };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EINPROGRESS) {
                    return Err(FicheroError::ConnectFailure(format!("{address}: {err}")));
                }
            }

            let socket = AsyncFd::new(fd)
                .map_err(|e| FicheroError::ConnectFailure(format!("{address}: {e}")))?;

            info!("Connecting to {} (RFCOMM channel {})...", address, channel);
            match tokio::time::timeout(CONNECT_TIMEOUT, socket.writable()).await {
                Err(_) => {
                    return Err(FicheroError::ConnectFailure(format!(
                        "{address}: timed out after {CONNECT_TIMEOUT:?}"
                    )));
                }
                Ok(Err(e)) => {
                    return Err(FicheroError::ConnectFailure(format!("{address}: {e}")));
                }
                Ok(Ok(_guard)) => {}
            }

            let pending = socket_error(socket.as_raw_fd())
                .map_err(|e| FicheroError::ConnectFailure(format!("{address}: {e}")))?;
            if pending != 0 {
                return Err(FicheroError::ConnectFailure(format!(
                    "{address}: {}",
                    io::Error::from_raw_os_error(pending)
                )));
            }
            info!("Connected to {}", address);

            Ok(Self {
                address: address.to_string(),
                socket: Arc::new(socket),
                reader: Mutex::new(None),
                subscriber: Mutex::new(None),
                closed: AtomicBool::new(false),
            })
        }
    }

    /// Read `SO_ERROR` to learn how a non-blocking connect ended.
    fn socket_error(fd: libc::c_int) -> io::Result<libc::c_int> {
        let mut err: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(err)
    }

    /// Deliver every `recv` to the callback until EOF or an error.
    async fn read_loop(socket: Arc<AsyncFd<OwnedFd>>, callback: NotifyCallback) {
        let mut buf = [0u8; READ_SIZE];
        loop {
            let mut guard = match socket.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    callback(Notification::Error(e.to_string()));
                    return;
                }
            };
            let result = guard.try_io(|inner| {
                let n = unsafe {
                    libc::recv(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(Ok(0)) => {
                    debug!("RFCOMM peer closed the connection");
                    callback(Notification::Closed);
                    return;
                }
                Ok(Ok(n)) => callback(Notification::Data(buf[..n].to_vec())),
                Ok(Err(e)) => {
                    warn!("RFCOMM read failed: {}", e);
                    callback(Notification::Error(e.to_string()));
                    return;
                }
                Err(_would_block) => continue,
            }
        }
    }

    #[async_trait]
    impl Transport for RfcommTransport {
        async fn write(&self, data: &[u8]) -> Result<()> {
            if self.closed.load(Ordering::Acquire) {
                return Err(FicheroError::TransportClosed);
            }
            let mut sent = 0;
            while sent < data.len() {
                let mut guard = self.socket.writable().await?;
                let result = guard.try_io(|inner| {
                    let n = unsafe {
                        libc::send(
                            inner.as_raw_fd(),
                            data[sent..].as_ptr() as *const libc::c_void,
                            data.len() - sent,
                            libc::MSG_NOSIGNAL,
                        )
                    };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                });
                match result {
                    Ok(Ok(n)) => sent += n,
                    Ok(Err(e)) => {
                        return Err(FicheroError::Transport(format!("Write failed: {e}")));
                    }
                    Err(_would_block) => continue,
                }
            }
            Ok(())
        }

        async fn subscribe(&self, callback: NotifyCallback) -> Result<()> {
            if self.closed.load(Ordering::Acquire) {
                return Err(FicheroError::TransportClosed);
            }
            let handle = tokio::spawn(read_loop(Arc::clone(&self.socket), Arc::clone(&callback)));
            *self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
            let previous = self
                .reader
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(handle);
            if let Some(previous) = previous {
                previous.abort();
            }
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(reader) = reader {
                reader.abort();
            }
            unsafe {
                libc::shutdown(self.socket.as_raw_fd(), libc::SHUT_RDWR);
            }
            let subscriber = self
                .subscriber
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(callback) = subscriber {
                callback(Notification::Closed);
            }
            info!("Closed RFCOMM link to {}", self.address);
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Rfcomm
        }
    }

    impl Drop for RfcommTransport {
        fn drop(&mut self) {
            if let Some(reader) = self.reader.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
                reader.abort();
            }
        }
    }
}

/// Placeholder on platforms without `AF_BLUETOOTH` sockets.
#[cfg(not(target_os = "linux"))]
pub struct RfcommTransport {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl RfcommTransport {
    pub async fn connect(_address: &str, _channel: u8) -> Result<Self> {
        Err(unavailable())
    }
}

#[cfg(not(target_os = "linux"))]
fn unavailable() -> FicheroError {
    FicheroError::TransportUnavailable(
        "RFCOMM transport requires Linux with BlueZ".to_string(),
    )
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl Transport for RfcommTransport {
    async fn write(&self, _data: &[u8]) -> Result<()> {
        Err(unavailable())
    }

    async fn subscribe(&self, _callback: NotifyCallback) -> Result<()> {
        Err(unavailable())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Rfcomm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bdaddr() {
        let addr = parse_bdaddr("A4:93:40:A0:87:57").unwrap();
        // BlueZ reversed: 57:87:A0:40:93:A4
        assert_eq!(addr, [0x57, 0x87, 0xA0, 0x40, 0x93, 0xA4]);
    }

    #[test]
    fn test_parse_bdaddr_invalid() {
        assert!(parse_bdaddr("not-an-address").is_err());
        assert!(parse_bdaddr("A4:93:40:A0:87").is_err());
        assert!(parse_bdaddr("A4:93:40:A0:87:XX").is_err());
    }

    #[test]
    fn test_default_channel() {
        assert_eq!(DEFAULT_CHANNEL, 1);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_invalid_address_fails_before_socket() {
        let result = RfcommTransport::connect("nope", DEFAULT_CHANNEL).await;
        assert!(matches!(result, Err(FicheroError::InvalidCommand(_))));
    }
}
