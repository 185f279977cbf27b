//! Shared data structures between kernel and userspace
//!
//! These structures must be repr(C) to ensure consistent memory layout
//! between eBPF programs and userspace code. Structures used as map keys
//! carry explicit padding so that every byte hashed by the kernel is
//! initialized.

use crate::constants::*;

/// Opaque kernel socket handle (`struct sock *` as an integer)
///
/// Only ever compared and hashed, never dereferenced. The kernel may
/// recycle the address once the socket is freed, so entries keyed by it
/// are dropped as soon as the connection leaves the handshake window.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketId(pub u64);

/// Stable connection identity: (descriptor, owning process)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// File descriptor passed to connect()
    pub fd: u64,
    /// Owning process (thread group) id
    pub pid: u32,
    /// Padding, always zero
    pub _padding: [u8; 4],
}

impl ConnectionId {
    #[inline(always)]
    pub const fn new(fd: u64, pid: u32) -> Self {
        Self {
            fd,
            pid,
            _padding: [0; 4],
        }
    }
}

/// Per-connection lifecycle record
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Connection {
    /// Monotonic timestamp of connect initiation (nanoseconds)
    pub timestamp: u64,
    /// Number of bytes sent
    pub bytes_sent: u64,
    /// Number of bytes received
    pub bytes_received: u64,
}

impl Connection {
    #[inline(always)]
    pub const fn started_at(timestamp: u64) -> Self {
        Self {
            timestamp,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

/// Key of an in-flight L7 request
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct L7RequestKey {
    pub fd: u64,
    pub pid: u32,
    /// 1 if the request was observed on a TLS stream
    pub is_tls: u16,
    /// Stream id for multiplexed protocols, `STREAM_ID_NONE` otherwise
    pub stream_id: i16,
}

impl L7RequestKey {
    /// Key of the non-multiplexed request on `id`
    #[inline(always)]
    pub const fn unstreamed(id: ConnectionId, is_tls: bool) -> Self {
        Self {
            fd: id.fd,
            pid: id.pid,
            is_tls: is_tls as u16,
            stream_id: STREAM_ID_NONE,
        }
    }
}

/// In-flight L7 request, written by the payload parsers
#[repr(C)]
#[derive(Clone, Copy)]
pub struct L7Request {
    pub ns: u64,
    pub protocol: u8,
    pub partial: u8,
    pub request_type: u8,
    pub _padding: u8,
    pub request_id: i32,
    pub payload_size: u64,
    pub payload: [u8; MAX_PAYLOAD_SIZE],
}

/// Address/port pair, key and value of the destination override table
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IpPort {
    /// IPv6 or IPv4-mapped IPv6 address
    pub ip: [u8; 16],
    /// Port (host byte order)
    pub port: u16,
}

/// Lifecycle event sent from kernel to userspace
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TcpEvent {
    pub fd: u64,
    /// Connection start (nanoseconds, monotonic), zero for listener events
    pub timestamp: u64,
    /// Time from connect initiation to the event (nanoseconds)
    pub duration: u64,
    /// See EVENT_TYPE_* constants
    pub event_type: u32,
    pub pid: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub sport: u16,
    pub dport: u16,
    /// Actual destination port, zero unless overridden
    pub aport: u16,
    pub saddr: [u8; 16],
    pub daddr: [u8; 16],
    /// Actual destination address, zero unless overridden
    pub aaddr: [u8; 16],
    /// Padding for alignment
    pub _padding: [u8; 2],
}

/// Kind of an emitted lifecycle event
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionOpen = EVENT_TYPE_CONNECTION_OPEN,
    ConnectionClose = EVENT_TYPE_CONNECTION_CLOSE,
    ConnectionError = EVENT_TYPE_CONNECTION_ERROR,
    ListenOpen = EVENT_TYPE_LISTEN_OPEN,
    ListenClose = EVENT_TYPE_LISTEN_CLOSE,
}

impl EventKind {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            EVENT_TYPE_CONNECTION_OPEN => Some(Self::ConnectionOpen),
            EVENT_TYPE_CONNECTION_CLOSE => Some(Self::ConnectionClose),
            EVENT_TYPE_CONNECTION_ERROR => Some(Self::ConnectionError),
            EVENT_TYPE_LISTEN_OPEN => Some(Self::ListenOpen),
            EVENT_TYPE_LISTEN_CLOSE => Some(Self::ListenClose),
            _ => None,
        }
    }

    /// Output channel this kind is written to
    pub const fn channel(self) -> Channel {
        match self {
            Self::ListenOpen | Self::ListenClose => Channel::Listen,
            _ => Channel::Connect,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ConnectionOpen => "connection_open",
            Self::ConnectionClose => "connection_close",
            Self::ConnectionError => "connection_error",
            Self::ListenOpen => "listen_open",
            Self::ListenClose => "listen_close",
        }
    }
}

/// Output channel of a lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// High-cardinality connection churn
    Connect,
    /// Low-cardinality listener changes
    Listen,
}

impl Channel {
    pub const fn map_name(self) -> &'static str {
        match self {
            Self::Connect => CONNECT_EVENTS_MAP,
            Self::Listen => LISTEN_EVENTS_MAP,
        }
    }
}

/// TCP socket state as reported by `sock:inet_sock_set_state`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
}

impl TcpState {
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            TCP_ESTABLISHED => Some(Self::Established),
            TCP_SYN_SENT => Some(Self::SynSent),
            TCP_SYN_RECV => Some(Self::SynRecv),
            TCP_FIN_WAIT1 => Some(Self::FinWait1),
            TCP_FIN_WAIT2 => Some(Self::FinWait2),
            TCP_TIME_WAIT => Some(Self::TimeWait),
            TCP_CLOSE => Some(Self::Close),
            TCP_CLOSE_WAIT => Some(Self::CloseWait),
            TCP_LAST_ACK => Some(Self::LastAck),
            TCP_LISTEN => Some(Self::Listen),
            TCP_CLOSING => Some(Self::Closing),
            TCP_NEW_SYN_RECV => Some(Self::NewSynRecv),
            _ => None,
        }
    }
}

// Compile-time alignment checks
// These will fail to compile if alignment is wrong
const _: () = {
    assert!(core::mem::size_of::<ConnectionId>() == 16);
    assert!(core::mem::size_of::<Connection>() == 24);
    assert!(core::mem::size_of::<L7RequestKey>() == 16);
    assert!(core::mem::size_of::<IpPort>() == 18);
    assert!(core::mem::size_of::<TcpEvent>() % core::mem::align_of::<TcpEvent>() == 0);
    assert!(core::mem::size_of::<L7Request>() % core::mem::align_of::<L7Request>() == 0);
};

// Implement Aya's Pod trait for userspace usage
#[cfg(feature = "userspace")]
mod userspace_impls {
    use super::*;

    // Pod trait implementations for map access and perf buffer decoding
    unsafe impl aya::Pod for SocketId {}
    unsafe impl aya::Pod for ConnectionId {}
    unsafe impl aya::Pod for Connection {}
    unsafe impl aya::Pod for L7RequestKey {}
    unsafe impl aya::Pod for IpPort {}
    unsafe impl aya::Pod for TcpEvent {}
}
