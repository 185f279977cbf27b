//! connect() and close() syscall handlers
//!
//! `sys_enter_connect` records which descriptor the calling thread is
//! connecting so that the state transition handler, running on the same
//! thread, can attribute the socket. `sys_exit_connect` covers sockets
//! that never pass through the TCP state machine, and `sys_enter_close`
//! ends every tracked connection.

use conntrace_common::{Connection, ConnectionId, EventKind, L7RequestKey};

use crate::{
    emit::{emit, Record},
    pid_of, Env, Lookup, Outcome, Remove, Table,
};

/// connect() entry: remember the descriptor for this thread
pub fn on_connect_enter<E: Env>(env: &E, pid_tgid: u64, fd: u64) -> Outcome {
    env.pending_connects().insert(&pid_tgid, &fd);
    Outcome::Indexed
}

/// connect() exit
///
/// A successful connect() on a descriptor without state is a non-TCP
/// connection and gets its state created here. Any L7 request pending on
/// the descriptor belongs to a previous connection and is dropped.
pub fn on_connect_exit<E: Env>(env: &E, pid_tgid: u64, ret: i64) -> Outcome {
    let Some(fd) = env.pending_connects().get(&pid_tgid) else {
        return Outcome::Untracked;
    };
    let id = ConnectionId::new(fd, pid_of(pid_tgid));

    // NOEXIST: a concurrent SYN_SENT transition owns the row if it got there first
    let created =
        ret == 0 && env.connections().insert_new(&id, &Connection::started_at(env.now_ns()));

    env.requests().remove(&L7RequestKey::unstreamed(id, false));
    env.requests().remove(&L7RequestKey::unstreamed(id, true));
    env.pending_connects().remove(&pid_tgid);

    if created {
        Outcome::Indexed
    } else {
        Outcome::Released
    }
}

/// close() entry: report and forget a tracked descriptor
pub fn on_close_enter<E: Env>(env: &E, pid_tgid: u64, fd: u64) -> Outcome {
    let id = ConnectionId::new(fd, pid_of(pid_tgid));
    let Some(conn) = env.connections().get(&id) else {
        return Outcome::Untracked;
    };

    let mut record = Record::new(EventKind::ConnectionClose, id.fd, id.pid);
    record.timestamp = conn.timestamp;
    record.bytes_sent = conn.bytes_sent;
    record.bytes_received = conn.bytes_received;

    let outcome = emit(env, &record, None);
    env.connections().remove(&id);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        on_state_change,
        testing::{change, pid_tgid, TestEnv},
    };
    use conntrace_common::{
        Channel, SocketId, TcpEvent, TCP_CLOSE, TCP_ESTABLISHED, TCP_FIN_WAIT1, TCP_SYN_SENT,
    };

    const THREAD: u64 = pid_tgid(1234, 1240);
    const ECONNREFUSED: i64 = -111;
    const EINPROGRESS: i64 = -115;

    fn kind(e: &TcpEvent) -> Option<EventKind> {
        EventKind::from_raw(e.event_type)
    }

    #[test]
    fn test_connect_enter_overwrites_pending_descriptor() {
        let env = TestEnv::new();

        on_connect_enter(&env, THREAD, 5);
        on_connect_enter(&env, THREAD, 7);

        assert_eq!(env.pending_connects.peek(&THREAD), Some(7));
        assert_eq!(env.pending_connects.len(), 1);
    }

    #[test]
    fn test_tcp_connect_lifecycle() {
        let env = TestEnv::new();
        let sk = SocketId(0xffff_8880_0000_1000);

        on_connect_enter(&env, THREAD, 7);
        on_state_change(&env, THREAD, &change(sk, TCP_CLOSE, TCP_SYN_SENT));
        // the transition consumed the pending descriptor
        assert_eq!(on_connect_exit(&env, THREAD, EINPROGRESS), Outcome::Untracked);
        env.advance(1_500);
        on_state_change(&env, 0, &change(sk, TCP_SYN_SENT, TCP_ESTABLISHED));
        on_state_change(&env, THREAD, &change(sk, TCP_ESTABLISHED, TCP_FIN_WAIT1));
        let closed = on_close_enter(&env, THREAD, 7);

        assert_eq!(closed, Outcome::Emitted(EventKind::ConnectionClose));
        let out = env.emitted();
        assert_eq!(out.len(), 2);

        let (channel, open) = out[0];
        assert_eq!(channel, Channel::Connect);
        assert_eq!(kind(&open), Some(EventKind::ConnectionOpen));
        assert_eq!((open.pid, open.fd), (1234, 7));
        assert!(open.duration > 0);

        let (channel, close) = out[1];
        assert_eq!(channel, Channel::Connect);
        assert_eq!(kind(&close), Some(EventKind::ConnectionClose));
        assert_eq!((close.pid, close.fd), (1234, 7));
        assert_eq!(close.bytes_sent, 0);
        assert_eq!(close.bytes_received, 0);
        assert_eq!(close.timestamp, open.timestamp);

        assert_eq!(env.connections.len(), 0);
        assert_eq!(env.sockets.len(), 0);
        assert_eq!(env.pending_connects.len(), 0);
    }

    #[test]
    fn test_non_tcp_connect_creates_state() {
        let env = TestEnv::new();
        let id = ConnectionId::new(9, 1234);

        on_connect_enter(&env, THREAD, 9);
        let outcome = on_connect_exit(&env, THREAD, 0);

        assert_eq!(outcome, Outcome::Indexed);
        assert_eq!(env.connections.peek(&id), Some(Connection::started_at(env.now_ns())));
        assert!(!env.pending_connects.contains(&THREAD));

        env.advance(10_000);
        assert_eq!(
            on_close_enter(&env, THREAD, 9),
            Outcome::Emitted(EventKind::ConnectionClose)
        );
        let e = env.emitted()[0].1;
        assert_eq!(e.bytes_sent, 0);
        assert_eq!(e.bytes_received, 0);
        assert_eq!(e.timestamp, 1_000_000);
        assert_eq!(e.duration, 0);
    }

    #[test]
    fn test_failed_connect_creates_no_state() {
        let env = TestEnv::new();

        on_connect_enter(&env, THREAD, 9);
        let outcome = on_connect_exit(&env, THREAD, ECONNREFUSED);

        assert_eq!(outcome, Outcome::Released);
        assert_eq!(env.connections.len(), 0);
        assert!(!env.pending_connects.contains(&THREAD));
    }

    #[test]
    fn test_connect_exit_keeps_existing_state() {
        let env = TestEnv::new();
        let id = ConnectionId::new(9, 1234);
        let existing = Connection {
            timestamp: 5,
            bytes_sent: 100,
            bytes_received: 200,
        };
        env.connections.seed(id, existing);
        env.advance(50);

        on_connect_enter(&env, THREAD, 9);
        let outcome = on_connect_exit(&env, THREAD, 0);

        assert_eq!(outcome, Outcome::Released);
        assert_eq!(env.connections.peek(&id), Some(existing));
    }

    #[test]
    fn test_connect_exit_drops_pending_requests() {
        let env = TestEnv::new();
        let id = ConnectionId::new(9, 1234);
        let plain = L7RequestKey::unstreamed(id, false);
        let tls = L7RequestKey::unstreamed(id, true);
        let mut stream = plain;
        stream.stream_id = 3;
        let other = L7RequestKey::unstreamed(ConnectionId::new(10, 1234), false);
        for key in [plain, tls, stream, other] {
            env.requests.seed(key, 1);
        }

        on_connect_enter(&env, THREAD, 9);
        on_connect_exit(&env, THREAD, ECONNREFUSED);

        assert!(!env.requests.contains(&plain));
        assert!(!env.requests.contains(&tls));
        assert!(env.requests.contains(&stream));
        assert!(env.requests.contains(&other));
    }

    #[test]
    fn test_connect_exit_without_entry_is_untracked() {
        let env = TestEnv::new();
        env.requests
            .seed(L7RequestKey::unstreamed(ConnectionId::new(9, 1234), false), 1);
        let before = env.snapshot();

        assert_eq!(on_connect_exit(&env, THREAD, 0), Outcome::Untracked);
        assert_eq!(env.snapshot(), before);
    }

    #[test]
    fn test_close_reports_exact_counters_once() {
        let env = TestEnv::new();
        let id = ConnectionId::new(7, 1234);
        let conn = Connection {
            timestamp: 42,
            bytes_sent: 1_024,
            bytes_received: 65_536,
        };
        env.connections.seed(id, conn);

        let first = on_close_enter(&env, THREAD, 7);
        let second = on_close_enter(&env, THREAD, 7);

        assert_eq!(first, Outcome::Emitted(EventKind::ConnectionClose));
        assert_eq!(second, Outcome::Untracked);
        let out = env.emitted();
        assert_eq!(out.len(), 1);
        let e = out[0].1;
        assert_eq!(e.timestamp, 42);
        assert_eq!(e.bytes_sent, 1_024);
        assert_eq!(e.bytes_received, 65_536);
        assert_eq!(e.saddr, [0; 16]);
        assert_eq!(e.aport, 0);
        assert!(!env.connections.contains(&id));
    }

    #[test]
    fn test_close_is_scoped_to_process() {
        let env = TestEnv::new();
        env.connections
            .seed(ConnectionId::new(7, 1234), Connection::started_at(1));

        let outcome = on_close_enter(&env, pid_tgid(4321, 4321), 7);

        assert_eq!(outcome, Outcome::Untracked);
        assert!(env.emitted().is_empty());
        assert_eq!(env.connections.len(), 1);
    }

    #[test]
    fn test_close_from_other_thread_of_same_process() {
        let env = TestEnv::new();
        env.connections
            .seed(ConnectionId::new(7, 1234), Connection::started_at(1));

        let outcome = on_close_enter(&env, pid_tgid(1234, 1300), 7);

        assert_eq!(outcome, Outcome::Emitted(EventKind::ConnectionClose));
    }
}
