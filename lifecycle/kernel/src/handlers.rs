//! Tracepoint handlers for connection lifecycle tracking
//!
//! Each entry point decodes its tracepoint record, runs the matching
//! tracker handler against the BPF maps and accounts the outcome.
//! Nothing is ever reported back to the kernel.

use aya_ebpf::{macros::tracepoint, programs::TracePointContext};
use conntrace_common::constants::*;
use lifecycle_tracker::{on_close_enter, on_connect_enter, on_connect_exit, on_state_change};

use crate::{helpers::*, tracepoint::*};

/// Track TCP socket state changes
///
/// Attached to: sock:inet_sock_set_state
#[tracepoint]
pub fn inet_sock_set_state(ctx: TracePointContext) -> u32 {
    match try_inet_sock_set_state(&ctx) {
        Ok(ret) => ret,
        Err(_) => {
            increment_stat(STAT_READ_ERRORS);
            0
        }
    }
}

fn try_inet_sock_set_state(ctx: &TracePointContext) -> Result<u32, i64> {
    increment_stat(STAT_TOTAL_EVENTS);

    let change = read_state_change(ctx)?;
    record_outcome(on_state_change(&ProbeEnv::new(ctx), get_pid_tgid(), &change));

    Ok(0)
}

/// Capture the descriptor of an outgoing connect()
///
/// Attached to: syscalls:sys_enter_connect
#[tracepoint]
pub fn sys_enter_connect(ctx: TracePointContext) -> u32 {
    match try_sys_enter_connect(&ctx) {
        Ok(ret) => ret,
        Err(_) => {
            increment_stat(STAT_READ_ERRORS);
            0
        }
    }
}

fn try_sys_enter_connect(ctx: &TracePointContext) -> Result<u32, i64> {
    increment_stat(STAT_TOTAL_EVENTS);

    let fd = read_syscall_fd(ctx)?;
    record_outcome(on_connect_enter(&ProbeEnv::new(ctx), get_pid_tgid(), fd));

    Ok(0)
}

/// Finish a connect(), creating state for non-TCP sockets
///
/// Attached to: syscalls:sys_exit_connect
#[tracepoint]
pub fn sys_exit_connect(ctx: TracePointContext) -> u32 {
    match try_sys_exit_connect(&ctx) {
        Ok(ret) => ret,
        Err(_) => {
            increment_stat(STAT_READ_ERRORS);
            0
        }
    }
}

fn try_sys_exit_connect(ctx: &TracePointContext) -> Result<u32, i64> {
    increment_stat(STAT_TOTAL_EVENTS);

    let ret = read_syscall_ret(ctx)?;
    record_outcome(on_connect_exit(&ProbeEnv::new(ctx), get_pid_tgid(), ret));

    Ok(0)
}

/// Report and forget connections whose descriptor is closed
///
/// Attached to: syscalls:sys_enter_close
#[tracepoint]
pub fn sys_enter_close(ctx: TracePointContext) -> u32 {
    match try_sys_enter_close(&ctx) {
        Ok(ret) => ret,
        Err(_) => {
            increment_stat(STAT_READ_ERRORS);
            0
        }
    }
}

fn try_sys_enter_close(ctx: &TracePointContext) -> Result<u32, i64> {
    increment_stat(STAT_TOTAL_EVENTS);

    let fd = read_syscall_fd(ctx)?;
    record_outcome(on_close_enter(&ProbeEnv::new(ctx), get_pid_tgid(), fd));

    Ok(0)
}
