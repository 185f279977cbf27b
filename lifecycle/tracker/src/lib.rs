//! Connection lifecycle tracker
//!
//! Stateful correlation of `sock:inet_sock_set_state`, `connect()` and
//! `close()` events into connection and listener lifecycle events.
//!
//! ## Architecture
//!
//! ```text
//! sys_enter_connect -> PENDING_CONNECTS[pid_tgid] = fd
//!                      |
//!                      v
//! CLOSE -> SYN_SENT -> SOCKETS[sk] = cid, CONNECTIONS[cid] = {ts}
//!                      |
//!                      v
//! SYN_SENT -> ESTABLISHED / CLOSE -> ConnectionOpen / ConnectionError
//!                      |
//!                      v
//! sys_enter_close   -> ConnectionClose, CONNECTIONS[cid] removed
//! ```
//!
//! The handlers are plain functions over an [`Env`], which bundles the
//! tables, the clock and the output channels. The eBPF program provides an
//! `Env` backed by BPF maps; tests provide one backed by memory.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod emit;
pub mod state;
pub mod syscalls;
pub mod table;

#[cfg(test)]
mod testing;

use conntrace_common::{Channel, Connection, ConnectionId, EventKind, IpPort, L7RequestKey, SocketId, TcpEvent};

pub use state::{on_state_change, StateChange};
pub use syscalls::{on_close_enter, on_connect_enter, on_connect_exit};
pub use table::{Lookup, Remove, Table};

/// Everything a handler may touch
pub trait Env {
    /// Descriptor captured at connect() entry, keyed by pid_tgid
    type PendingConnects: Table<u64, u64>;
    /// Socket identity to logical connection id
    type Sockets: Table<SocketId, ConnectionId>;
    /// Logical connection id to lifecycle record
    type Connections: Table<ConnectionId, Connection>;
    /// In-flight L7 requests; only ever cleared here
    type Requests: Remove<L7RequestKey>;
    /// Externally maintained destination overrides
    type Destinations: Lookup<IpPort, IpPort>;

    fn pending_connects(&self) -> &Self::PendingConnects;
    fn sockets(&self) -> &Self::Sockets;
    fn connections(&self) -> &Self::Connections;
    fn requests(&self) -> &Self::Requests;
    fn destinations(&self) -> &Self::Destinations;

    /// Monotonic clock in nanoseconds
    fn now_ns(&self) -> u64;

    /// Append a record to an output channel; loss is not reported
    fn output(&self, channel: Channel, event: &TcpEvent);
}

/// What a handler invocation did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Irrelevant protocol or transition, nothing touched
    Ignored,
    /// Correlation state was never observed (or already evicted)
    Untracked,
    /// Tables were mutated, no event emitted
    Indexed,
    /// connect() exit cleared correlation rows without creating state
    Released,
    /// An event of this kind was written
    Emitted(EventKind),
}

/// Split a `bpf_get_current_pid_tgid()` value into its process id
#[inline(always)]
pub const fn pid_of(pid_tgid: u64) -> u32 {
    (pid_tgid >> 32) as u32
}
