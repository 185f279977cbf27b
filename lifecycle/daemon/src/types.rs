//! Userspace type definitions
//!
//! Defines the decoded form of the lifecycle records read from the
//! kernel and the statistics reported by the daemon.
//!
//! ## Organization
//!
//! This module separates kernel and userspace types:
//! - **Kernel Types**: Types shared with eBPF programs (from conntrace_common)
//! - **Userspace Types**: Decoded events and counters used for export

use serde::Serialize;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

// ============================================================================
// Kernel Types (from eBPF programs)
// ============================================================================

pub mod kernel {
    //! Types shared between kernel eBPF programs and userspace
    //!
    //! These are re-exported from the conntrace-common crate and must
    //! maintain binary compatibility with the eBPF programs.

    pub use conntrace_common::constants;
    pub use conntrace_common::types::{Channel, EventKind, IpPort, TcpEvent};
}

// Re-export commonly used kernel types at module level for convenience
pub use kernel::{Channel, EventKind, TcpEvent};

/// A lifecycle event decoded from a `TcpEvent` record
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    /// Event kind (connection_open, connection_error, ...)
    pub kind: &'static str,
    /// Channel the record was read from
    pub channel: &'static str,
    pub pid: u32,
    pub fd: u64,
    /// Connection start on the kernel monotonic clock (ns), 0 if unknown
    pub timestamp_ns: u64,
    /// Time from connect initiation to this event (ns)
    pub duration_ns: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Local endpoint, absent for close events
    pub source: Option<SocketAddr>,
    /// Remote endpoint, absent for close events
    pub destination: Option<SocketAddr>,
    /// Endpoint behind address translation, if known
    pub actual_destination: Option<SocketAddr>,
    /// ISO 8601 wall clock time the record was read
    pub observed_at: String,
}

impl LifecycleEvent {
    /// Decode a raw record; `None` if the event type is unknown
    pub fn decode(raw: &TcpEvent, channel: Channel) -> Option<Self> {
        let kind = EventKind::from_raw(raw.event_type)?;

        Some(Self {
            kind: kind.name(),
            channel: channel.map_name(),
            pid: raw.pid,
            fd: raw.fd,
            timestamp_ns: raw.timestamp,
            duration_ns: raw.duration,
            bytes_sent: raw.bytes_sent,
            bytes_received: raw.bytes_received,
            source: endpoint(raw.saddr, raw.sport),
            destination: endpoint(raw.daddr, raw.dport),
            actual_destination: endpoint(raw.aaddr, raw.aport),
            observed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Convert a 16-byte address and port into a socket address
///
/// IPv4-mapped addresses are shown as IPv4. An all-zero endpoint means
/// "not set" and yields `None`.
pub fn endpoint(addr: [u8; 16], port: u16) -> Option<SocketAddr> {
    if port == 0 && addr == [0; 16] {
        return None;
    }
    let ip = Ipv6Addr::from(addr);
    let ip = match ip.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(ip),
    };
    Some(SocketAddr::new(ip, port))
}

/// Handler statistics summed over all CPUs
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandlerStats {
    pub total: u64,
    pub read_errors: u64,
    pub ignored: u64,
    pub untracked: u64,
    pub indexed: u64,
    pub released: u64,
    pub emitted: u64,
}

impl HandlerStats {
    /// Build from counters indexed by `STAT_*`
    pub fn from_counters(counters: &[u64]) -> Self {
        use kernel::constants::*;

        let at = |i: u32| counters.get(i as usize).copied().unwrap_or(0);
        Self {
            total: at(STAT_TOTAL_EVENTS),
            read_errors: at(STAT_READ_ERRORS),
            ignored: at(STAT_IGNORED),
            untracked: at(STAT_UNTRACKED),
            indexed: at(STAT_INDEXED),
            released: at(STAT_RELEASED),
            emitted: at(STAT_EMITTED),
        }
    }
}
