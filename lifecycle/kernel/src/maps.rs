//! BPF map definitions for connection lifecycle tracking
//!
//! Defines the correlation tables, the output channels and the
//! statistics counters, plus the adapters that hand the tables to the
//! tracker as bounded-table capabilities.

use aya_ebpf::{
    bindings::{BPF_ANY, BPF_NOEXIST},
    macros::map,
    maps::{LruHashMap, PerCpuArray, PerfEventArray},
};
use conntrace_common::{constants::*, types::*};
use lifecycle_tracker::{Lookup, Remove, Table};

/// Descriptor passed to an in-flight connect()
///
/// Key: pid_tgid of the calling thread
/// Value: file descriptor
#[map]
pub static PENDING_CONNECTS: LruHashMap<u64, u64> =
    LruHashMap::with_max_entries(MAX_PENDING_CONNECTS, 0);

/// Socket address to logical connection id
///
/// Only valid between SYN_SENT and the start of shutdown.
#[map]
pub static SOCKETS: LruHashMap<SocketId, ConnectionId> =
    LruHashMap::with_max_entries(MAX_CONNECTIONS, 0);

/// Active connections by logical id
#[map]
pub static CONNECTIONS: LruHashMap<ConnectionId, Connection> =
    LruHashMap::with_max_entries(MAX_CONNECTIONS, 0);

/// In-flight L7 requests, populated by the payload parsers
#[map]
pub static L7_REQUESTS: LruHashMap<L7RequestKey, L7Request> =
    LruHashMap::with_max_entries(MAX_L7_REQUESTS, 0);

/// Destination overrides keyed by source endpoint
///
/// Written by userspace (e.g. from conntrack NAT entries), read-only here.
#[map]
pub static ACTUAL_DESTINATIONS: LruHashMap<IpPort, IpPort> =
    LruHashMap::with_max_entries(MAX_DESTINATIONS, 0);

/// Connection lifecycle events (open, error, close)
#[map]
pub static TCP_CONNECT_EVENTS: PerfEventArray<TcpEvent> = PerfEventArray::new(0);

/// Listener lifecycle events (listen open, listen close)
#[map]
pub static TCP_LISTEN_EVENTS: PerfEventArray<TcpEvent> = PerfEventArray::new(0);

/// Per-CPU statistics counters
///
/// Index: stat_id (see STAT_* constants)
/// Value: u64 counter
#[map]
pub static STATS: PerCpuArray<u64> = PerCpuArray::with_max_entries(MAX_STATS, 0);

/// Zero-sized handle on an `LruHashMap` static, seen through the tracker's
/// table traits. The methods name the map directly so no static ever
/// holds a reference to a map.
macro_rules! lru_table {
    ($(#[$doc:meta])* $name:ident => $map:ident<$key:ty, $value:ty>) => {
        $(#[$doc])*
        pub struct $name;

        impl Lookup<$key, $value> for $name {
            #[inline(always)]
            fn get(&self, key: &$key) -> Option<$value> {
                unsafe { $map.get(key).copied() }
            }
        }

        impl Remove<$key> for $name {
            #[inline(always)]
            fn remove(&self, key: &$key) {
                let _ = $map.remove(key);
            }
        }

        impl Table<$key, $value> for $name {
            #[inline(always)]
            fn insert(&self, key: &$key, value: &$value) {
                let _ = $map.insert(key, value, BPF_ANY as u64);
            }

            #[inline(always)]
            fn insert_new(&self, key: &$key, value: &$value) -> bool {
                $map.insert(key, value, BPF_NOEXIST as u64).is_ok()
            }
        }
    };
}

lru_table!(PendingConnectTable => PENDING_CONNECTS<u64, u64>);
lru_table!(SocketTable => SOCKETS<SocketId, ConnectionId>);
lru_table!(ConnectionTable => CONNECTIONS<ConnectionId, Connection>);
lru_table!(L7RequestTable => L7_REQUESTS<L7RequestKey, L7Request>);
lru_table!(
    /// Only ever read by the handlers
    DestinationTable => ACTUAL_DESTINATIONS<IpPort, IpPort>
);
