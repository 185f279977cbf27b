//! Event assembly, destination enrichment and channel selection

use conntrace_common::{EventKind, IpPort, TcpEvent};

use crate::{state::StateChange, Env, Lookup, Outcome};

/// Fields resolved by a handler before emission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    pub kind: EventKind,
    pub fd: u64,
    pub pid: u32,
    pub timestamp: u64,
    pub duration: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl Record {
    pub const fn new(kind: EventKind, fd: u64, pid: u32) -> Self {
        Self {
            kind,
            fd,
            pid,
            timestamp: 0,
            duration: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

/// Build the wire record and write it to the channel of its kind
///
/// When the event was triggered by a state change, the endpoints are
/// copied from it and the destination override table is consulted with
/// the source endpoint. Without a trigger the endpoints stay zero.
#[inline(always)]
pub fn emit<E: Env>(env: &E, record: &Record, trigger: Option<&StateChange>) -> Outcome {
    let mut e = TcpEvent {
        fd: record.fd,
        timestamp: record.timestamp,
        duration: record.duration,
        event_type: record.kind as u32,
        pid: record.pid,
        bytes_sent: record.bytes_sent,
        bytes_received: record.bytes_received,
        ..TcpEvent::default()
    };

    if let Some(change) = trigger {
        e.sport = change.sport;
        e.dport = change.dport;
        e.saddr = change.saddr;
        e.daddr = change.daddr;

        let src = IpPort {
            ip: change.saddr,
            port: change.sport,
        };
        if let Some(actual) = env.destinations().get(&src) {
            e.aport = actual.port;
            e.aaddr = actual.ip;
        }
    }

    env.output(record.kind.channel(), &e);
    Outcome::Emitted(record.kind)
}
