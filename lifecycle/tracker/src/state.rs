//! TCP state transition handling
//!
//! Reacts to every `sock:inet_sock_set_state` event. Outbound connections
//! are indexed when they leave CLOSE for SYN_SENT, reported when the
//! handshake completes or fails, and unindexed by socket once they start
//! an orderly shutdown. Listeners are reported on open and close.

use conntrace_common::{Connection, ConnectionId, EventKind, SocketId, TcpState, IPPROTO_TCP};

use crate::{
    emit::{emit, Record},
    pid_of, Env, Lookup, Outcome, Remove, Table,
};

/// Decoded `inet_sock_set_state` payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub socket: SocketId,
    pub old_state: i32,
    pub new_state: i32,
    /// Source port (host byte order)
    pub sport: u16,
    /// Destination port (host byte order)
    pub dport: u16,
    pub protocol: u16,
    /// Source address, IPv4 mapped into IPv6
    pub saddr: [u8; 16],
    /// Destination address, IPv4 mapped into IPv6
    pub daddr: [u8; 16],
}

/// Handle a socket state change observed on the thread `pid_tgid`
pub fn on_state_change<E: Env>(env: &E, pid_tgid: u64, change: &StateChange) -> Outcome {
    if change.protocol != IPPROTO_TCP {
        return Outcome::Ignored;
    }
    let (Some(old), Some(new)) = (
        TcpState::from_raw(change.old_state),
        TcpState::from_raw(change.new_state),
    ) else {
        return Outcome::Ignored;
    };

    use TcpState::*;
    match (old, new) {
        (Close, SynSent) => connect_started(env, pid_tgid, change),
        (SynSent, Established) => connect_finished(env, change, EventKind::ConnectionOpen),
        (SynSent, Close) => connect_finished(env, change, EventKind::ConnectionError),
        (Established, FinWait1 | CloseWait) => shutdown_started(env, change),
        (Close, Listen) => listener(env, pid_tgid, change, EventKind::ListenOpen),
        (Listen, Close) => listener(env, pid_tgid, change, EventKind::ListenClose),
        _ => Outcome::Ignored,
    }
}

/// CLOSE -> SYN_SENT: bind the socket to the descriptor captured at connect()
fn connect_started<E: Env>(env: &E, pid_tgid: u64, change: &StateChange) -> Outcome {
    let Some(fd) = env.pending_connects().get(&pid_tgid) else {
        return Outcome::Untracked;
    };
    let id = ConnectionId::new(fd, pid_of(pid_tgid));
    let conn = Connection::started_at(env.now_ns());

    env.pending_connects().remove(&pid_tgid);
    env.sockets().insert(&change.socket, &id);
    env.connections().insert(&id, &conn);
    Outcome::Indexed
}

/// SYN_SENT -> ESTABLISHED or CLOSE
///
/// A failed handshake tears the connection down here. A successful one
/// keeps its state for the close handler.
fn connect_finished<E: Env>(env: &E, change: &StateChange, kind: EventKind) -> Outcome {
    let Some(id) = env.sockets().get(&change.socket) else {
        return Outcome::Untracked;
    };
    let Some(conn) = env.connections().get(&id) else {
        return Outcome::Untracked;
    };

    let mut record = Record::new(kind, id.fd, id.pid);
    record.duration = env.now_ns().saturating_sub(conn.timestamp);
    if kind == EventKind::ConnectionOpen {
        record.timestamp = conn.timestamp;
    } else {
        env.sockets().remove(&change.socket);
        env.connections().remove(&id);
    }
    emit(env, &record, Some(change))
}

/// ESTABLISHED -> FIN_WAIT1 / CLOSE_WAIT
///
/// The socket address may be reused by the kernel from here on, so only
/// the socket index is dropped. Counters stay until the descriptor closes.
fn shutdown_started<E: Env>(env: &E, change: &StateChange) -> Outcome {
    if env.sockets().get(&change.socket).is_none() {
        return Outcome::Untracked;
    }
    env.sockets().remove(&change.socket);
    Outcome::Indexed
}

/// CLOSE <-> LISTEN
///
/// No connect() precedes a listener, so the descriptor is reported as zero
/// and the pid is that of the current thread.
fn listener<E: Env>(env: &E, pid_tgid: u64, change: &StateChange, kind: EventKind) -> Outcome {
    emit(env, &Record::new(kind, 0, pid_of(pid_tgid)), Some(change))
}
