//! eBPF Connection Lifecycle Tracer - Kernel Space Program
//!
//! This eBPF program follows TCP sockets through their state machine and
//! correlates them with the connect() and close() calls of the owning
//! process, emitting connection and listener lifecycle events.
//!
//! ## Architecture
//!
//! ```text
//! sys_enter_connect   -> PENDING_CONNECTS[pid_tgid] = fd
//!                        |
//!                        v
//! inet_sock_set_state -> SOCKETS / CONNECTIONS indexed, open/error events
//!                        |                          -> TCP_CONNECT_EVENTS
//!                        |   listen open/close      -> TCP_LISTEN_EVENTS
//!                        v
//! sys_exit_connect    -> non-TCP fallback, stale L7 requests dropped
//!                        |
//!                        v
//! sys_enter_close     -> close event, CONNECTIONS[cid] removed
//! ```
//!
//! ## Usage
//!
//! This program must be compiled for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo build --release --target=bpfel-unknown-none
//! ```
//!
//! The compiled bytecode is then loaded by the userspace daemon.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;
mod tracepoint;

// Re-export tracepoint functions so they're visible to the loader
pub use handlers::{inet_sock_set_state, sys_enter_close, sys_enter_connect, sys_exit_connect};

// Re-export maps for verification
pub use maps::{
    ACTUAL_DESTINATIONS, CONNECTIONS, L7_REQUESTS, PENDING_CONNECTS, SOCKETS, STATS,
    TCP_CONNECT_EVENTS, TCP_LISTEN_EVENTS,
};

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // eBPF programs cannot panic - this should never be reached
    // The verifier should catch any potential panics
    loop {}
}
