//! Helper functions for eBPF programs
//!
//! Provides safe wrappers around BPF helper functions, the map-backed
//! tracker environment and statistics bookkeeping.

use aya_ebpf::{
    helpers::{bpf_get_current_pid_tgid, bpf_ktime_get_ns},
    EbpfContext,
};
use conntrace_common::{constants::*, types::*};
use lifecycle_tracker::{Env, Outcome};

use crate::maps::*;

/// Get current timestamp in nanoseconds
#[inline(always)]
#[allow(unused_unsafe)]
pub fn get_timestamp() -> u64 {
    unsafe { bpf_ktime_get_ns() }
}

/// Get the current (tgid << 32 | pid) identifier
#[inline(always)]
#[allow(unused_unsafe)]
pub fn get_pid_tgid() -> u64 {
    unsafe { bpf_get_current_pid_tgid() }
}

/// Increment a statistics counter on the current CPU
#[inline(always)]
pub fn increment_stat(stat_id: u32) {
    if let Some(count) = STATS.get_ptr_mut(stat_id) {
        unsafe { *count += 1 };
    }
}

/// Account a handler outcome
#[inline(always)]
pub fn record_outcome(outcome: Outcome) {
    let stat_id = match outcome {
        Outcome::Ignored => STAT_IGNORED,
        Outcome::Untracked => STAT_UNTRACKED,
        Outcome::Indexed => STAT_INDEXED,
        Outcome::Released => STAT_RELEASED,
        Outcome::Emitted(_) => STAT_EMITTED,
    };
    increment_stat(stat_id);
}

/// Tracker environment backed by the BPF maps
pub struct ProbeEnv<'a, C: EbpfContext> {
    ctx: &'a C,
}

impl<'a, C: EbpfContext> ProbeEnv<'a, C> {
    #[inline(always)]
    pub fn new(ctx: &'a C) -> Self {
        Self { ctx }
    }
}

impl<C: EbpfContext> Env for ProbeEnv<'_, C> {
    type PendingConnects = PendingConnectTable;
    type Sockets = SocketTable;
    type Connections = ConnectionTable;
    type Requests = L7RequestTable;
    type Destinations = DestinationTable;

    #[inline(always)]
    fn pending_connects(&self) -> &Self::PendingConnects {
        &PendingConnectTable
    }

    #[inline(always)]
    fn sockets(&self) -> &Self::Sockets {
        &SocketTable
    }

    #[inline(always)]
    fn connections(&self) -> &Self::Connections {
        &ConnectionTable
    }

    #[inline(always)]
    fn requests(&self) -> &Self::Requests {
        &L7RequestTable
    }

    #[inline(always)]
    fn destinations(&self) -> &Self::Destinations {
        &DestinationTable
    }

    #[inline(always)]
    fn now_ns(&self) -> u64 {
        get_timestamp()
    }

    #[inline(always)]
    fn output(&self, channel: Channel, event: &TcpEvent) {
        match channel {
            Channel::Connect => TCP_CONNECT_EVENTS.output(self.ctx, event, 0),
            Channel::Listen => TCP_LISTEN_EVENTS.output(self.ctx, event, 0),
        }
    }
}
