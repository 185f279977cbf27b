//! Shared types and constants for the connection lifecycle tracer
//!
//! This crate provides the map key/value layouts, the wire-format event
//! record and the constants shared between the eBPF program and the
//! userspace daemon.

#![no_std]

pub mod constants;
pub mod layout;
pub mod types;

// Re-export commonly used types
pub use constants::*;
pub use types::{
    Channel, Connection, ConnectionId, EventKind, IpPort, L7Request, L7RequestKey, SocketId,
    TcpEvent, TcpState,
};
