//! Raw Ethernet transport
//!
//! Opens an `AF_PACKET`/`SOCK_RAW` socket bound to one interface and writes
//! each encoded snapshot as a single frame. Binding requires `CAP_NET_RAW`
//! (or root); failures surface as [`SvPubError::Bind`] so the publisher stays
//! unconfigured.
//!
//! Only Linux is supported. On other platforms [`EthernetBinder::bind`]
//! always fails.

use super::encoding::{FrameEncoder, SvFrameEncoder};
use super::{Transport, TransportBinder};
use crate::config::StreamSettings;
use crate::error::{Result, SvPubError};
use crate::types::Snapshot;

/// Binds [`EthernetTransport`]s using the configured stream addressing
#[derive(Debug, Clone, Default)]
pub struct EthernetBinder {
    stream: StreamSettings,
}

impl EthernetBinder {
    /// Create a binder for the given stream settings
    pub fn new(stream: StreamSettings) -> Self {
        Self { stream }
    }

    /// Build the frame encoder for an interface
    fn encoder_for(&self, interface: &str) -> Result<SvFrameEncoder> {
        let source = interface_mac(interface).unwrap_or_else(|| {
            tracing::warn!("No hardware address for '{}', using 00:00:00:00:00:00", interface);
            [0; 6]
        });
        self.stream.encoder(source)
    }
}

impl TransportBinder for EthernetBinder {
    fn bind(&self, interface: &str) -> Result<Box<dyn Transport>> {
        let encoder = self.encoder_for(interface)?;
        let transport = EthernetTransport::open(interface, Box::new(encoder))?;
        Ok(Box::new(transport))
    }
}

/// Read an interface's MAC address from sysfs
fn interface_mac(interface: &str) -> Option<[u8; 6]> {
    let path = format!("/sys/class/net/{}/address", interface);
    let text = std::fs::read_to_string(path).ok()?;
    super::encoding::parse_mac(&text).ok()
}

/// A raw socket bound to one interface
pub struct EthernetTransport {
    interface: String,
    #[cfg(target_os = "linux")]
    socket: std::os::fd::OwnedFd,
    encoder: Box<dyn FrameEncoder>,
    frame: Vec<u8>,
}

impl std::fmt::Debug for EthernetTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetTransport")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl EthernetTransport {
    /// Interface this transport writes to
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

#[cfg(target_os = "linux")]
impl EthernetTransport {
    /// Open and bind a raw socket on `interface`
    pub fn open(interface: &str, encoder: Box<dyn FrameEncoder>) -> Result<Self> {
        use std::ffi::CString;
        use std::os::fd::{FromRawFd, OwnedFd};

        let c_name = CString::new(interface)
            .map_err(|_| SvPubError::bind(interface, "interface name contains NUL"))?;

        // SAFETY: c_name is a valid NUL-terminated string
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            return Err(SvPubError::bind(interface, std::io::Error::last_os_error()));
        }

        // Protocol 0: transmit only, nothing is queued for reading
        let protocol: u16 = 0;

        // SAFETY: plain socket(2) call, the result is checked below
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, protocol as libc::c_int) };
        if fd < 0 {
            return Err(SvPubError::bind(interface, std::io::Error::last_os_error()));
        }
        // SAFETY: fd is a freshly created descriptor we exclusively own
        let socket = unsafe { OwnedFd::from_raw_fd(fd) };

        // SAFETY: sockaddr_ll is plain old data, all-zero is a valid value
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = index as libc::c_int;

        // SAFETY: addr outlives the call and the length matches its type
        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(SvPubError::bind(interface, std::io::Error::last_os_error()));
        }

        tracing::info!("Bound raw socket on '{}' (ifindex {})", interface, index);

        Ok(Self {
            interface: interface.to_string(),
            socket,
            encoder,
            frame: Vec::with_capacity(super::encoding::MAX_FRAME_LEN),
        })
    }

    fn write_frame(&self) -> Result<()> {
        use std::os::fd::AsRawFd;

        // SAFETY: the buffer pointer and length describe self.frame
        let written = unsafe {
            libc::send(
                self.socket.as_raw_fd(),
                self.frame.as_ptr() as *const libc::c_void,
                self.frame.len(),
                0,
            )
        };
        if written < 0 {
            return Err(SvPubError::Transmit(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        if written as usize != self.frame.len() {
            return Err(SvPubError::Transmit(format!(
                "short write: {} of {} bytes",
                written,
                self.frame.len()
            )));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl EthernetTransport {
    /// Raw sockets are only available on Linux
    pub fn open(interface: &str, _encoder: Box<dyn FrameEncoder>) -> Result<Self> {
        Err(SvPubError::bind(
            interface,
            "raw Ethernet sockets are only supported on Linux",
        ))
    }

    fn write_frame(&self) -> Result<()> {
        Err(SvPubError::Transmit("unsupported platform".to_string()))
    }
}

impl Transport for EthernetTransport {
    fn send(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.encoder.encode(snapshot, &mut self.frame)?;
        self.write_frame()
    }
}
