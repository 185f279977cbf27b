//! Shared constants for the lifecycle tracer
//!
//! These constants are used by both kernel and userspace programs
//! to ensure consistency in map sizing, event discriminants and
//! statistics indices.

// ============================================================================
// BPF Map Sizes
// ============================================================================

/// Maximum number of tracked connections (identity and state tables)
pub const MAX_CONNECTIONS: u32 = 1_000_000;

/// Maximum number of connect() calls awaiting correlation
pub const MAX_PENDING_CONNECTS: u32 = 10240;

/// Maximum number of in-flight L7 requests
pub const MAX_L7_REQUESTS: u32 = 32768;

/// Maximum number of destination overrides
pub const MAX_DESTINATIONS: u32 = 10240;

/// Size of the L7 request payload buffer (must be a power of 2)
pub const MAX_PAYLOAD_SIZE: usize = 1024;

// ============================================================================
// Event Types (for TcpEvent.event_type)
// ============================================================================

/// No event; never written to an output channel
pub const EVENT_TYPE_NONE: u32 = 0;

/// Outbound connection reached ESTABLISHED
pub const EVENT_TYPE_CONNECTION_OPEN: u32 = 3;

/// Tracked descriptor was closed
pub const EVENT_TYPE_CONNECTION_CLOSE: u32 = 4;

/// Outbound connection failed before ESTABLISHED
pub const EVENT_TYPE_CONNECTION_ERROR: u32 = 5;

/// Socket entered LISTEN
pub const EVENT_TYPE_LISTEN_OPEN: u32 = 6;

/// Listening socket was closed
pub const EVENT_TYPE_LISTEN_CLOSE: u32 = 7;

// ============================================================================
// TCP States (from include/net/tcp_states.h)
// ============================================================================

pub const TCP_ESTABLISHED: i32 = 1;
pub const TCP_SYN_SENT: i32 = 2;
pub const TCP_SYN_RECV: i32 = 3;
pub const TCP_FIN_WAIT1: i32 = 4;
pub const TCP_FIN_WAIT2: i32 = 5;
pub const TCP_TIME_WAIT: i32 = 6;
pub const TCP_CLOSE: i32 = 7;
pub const TCP_CLOSE_WAIT: i32 = 8;
pub const TCP_LAST_ACK: i32 = 9;
pub const TCP_LISTEN: i32 = 10;
pub const TCP_CLOSING: i32 = 11;
pub const TCP_NEW_SYN_RECV: i32 = 12;

// ============================================================================
// Protocol Numbers (from linux/in.h)
// ============================================================================

/// TCP protocol number
pub const IPPROTO_TCP: u16 = 6;

/// UDP protocol number
pub const IPPROTO_UDP: u16 = 17;

// ============================================================================
// L7 Request Keys
// ============================================================================

/// Stream id used for requests that are not multiplexed
pub const STREAM_ID_NONE: i16 = -1;

// ============================================================================
// Output Channels
// ============================================================================

/// Perf event array carrying connection lifecycle events
pub const CONNECT_EVENTS_MAP: &str = "TCP_CONNECT_EVENTS";

/// Perf event array carrying listener lifecycle events
pub const LISTEN_EVENTS_MAP: &str = "TCP_LISTEN_EVENTS";

// ============================================================================
// Statistics Counter Indices (for STATS map)
// ============================================================================

/// Total number of handler invocations
pub const STAT_TOTAL_EVENTS: u32 = 0;

/// Tracepoint payloads that could not be read
pub const STAT_READ_ERRORS: u32 = 1;

/// Invocations for an irrelevant protocol or transition
pub const STAT_IGNORED: u32 = 2;

/// Invocations whose correlation state was never observed
pub const STAT_UNTRACKED: u32 = 3;

/// Invocations that mutated tables without emitting
pub const STAT_INDEXED: u32 = 4;

/// connect() exits that only released correlation rows
pub const STAT_RELEASED: u32 = 5;

/// Events written to an output channel
pub const STAT_EMITTED: u32 = 6;

/// Total number of statistics counters
pub const MAX_STATS: u32 = 7;

/// Human readable names, indexed by `STAT_*`
pub const STAT_NAMES: [&str; MAX_STATS as usize] = [
    "total",
    "read_errors",
    "ignored",
    "untracked",
    "indexed",
    "released",
    "emitted",
];
