//! Tracepoint payload parsing
//!
//! Raw tracepoint records are read at fixed offsets. The
//! `sock:inet_sock_set_state` layout differs between kernels, so the two
//! variations are read-only globals patched by the loader before the
//! program is verified.

use aya_ebpf::programs::TracePointContext;
use conntrace_common::{
    layout::{StateChangeLayout, SYSCALL_ARG0_OFFSET, SYSCALL_RET_OFFSET},
    types::SocketId,
};
use lifecycle_tracker::StateChange;

/// Non-zero when the tracepoint record carries an extra 8-byte header
#[no_mangle]
static CTX_EXTRA_PADDING: u8 = 0;

/// Non-zero on kernels before 5.6, where `protocol` is a single byte
#[no_mangle]
static PROTOCOL_U8: u8 = 0;

#[inline(always)]
fn flag(value: &u8) -> bool {
    unsafe { core::ptr::read_volatile(value) != 0 }
}

/// Decode an `inet_sock_set_state` record
#[inline(always)]
pub fn read_state_change(ctx: &TracePointContext) -> Result<StateChange, i64> {
    let layout = StateChangeLayout::new(flag(&CTX_EXTRA_PADDING), flag(&PROTOCOL_U8));

    unsafe {
        let protocol = if layout.protocol_u8 {
            ctx.read_at::<u8>(layout.protocol)? as u16
        } else {
            ctx.read_at::<u16>(layout.protocol)?
        };

        Ok(StateChange {
            socket: SocketId(ctx.read_at::<u64>(layout.skaddr)?),
            old_state: ctx.read_at::<i32>(layout.oldstate)?,
            new_state: ctx.read_at::<i32>(layout.newstate)?,
            sport: ctx.read_at::<u16>(layout.sport)?,
            dport: ctx.read_at::<u16>(layout.dport)?,
            protocol,
            saddr: ctx.read_at::<[u8; 16]>(layout.saddr_v6)?,
            daddr: ctx.read_at::<[u8; 16]>(layout.daddr_v6)?,
        })
    }
}

/// First argument of a syscall entry (the descriptor for connect/close)
#[inline(always)]
pub fn read_syscall_fd(ctx: &TracePointContext) -> Result<u64, i64> {
    unsafe { ctx.read_at::<u64>(SYSCALL_ARG0_OFFSET) }
}

/// Return value of a syscall exit
#[inline(always)]
pub fn read_syscall_ret(ctx: &TracePointContext) -> Result<i64, i64> {
    unsafe { ctx.read_at::<i64>(SYSCALL_RET_OFFSET) }
}
