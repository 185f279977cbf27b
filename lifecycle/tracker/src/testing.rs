//! In-memory environment for handler tests

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use conntrace_common::{
    Channel, Connection, ConnectionId, IpPort, L7RequestKey, SocketId, TcpEvent, IPPROTO_TCP,
};

use crate::{Env, Lookup, Remove, StateChange, Table};

/// Bounded table with least-recently-used eviction
///
/// Rows are kept in recency order, most recent last.
pub struct MemTable<K, V> {
    rows: RefCell<Vec<(K, V)>>,
    capacity: usize,
}

impl<K: Copy + PartialEq, V: Copy> MemTable<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            capacity,
        }
    }

    /// Insert without going through the handler traits
    pub fn seed(&self, key: K, value: V) {
        Table::insert(self, &key, &value);
    }

    /// Lookup that does not refresh recency
    pub fn peek(&self, key: &K) -> Option<V> {
        self.rows
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn rows(&self) -> Vec<(K, V)> {
        self.rows.borrow().clone()
    }
}

impl<K: Copy + PartialEq, V: Copy> Lookup<K, V> for MemTable<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        let mut rows = self.rows.borrow_mut();
        let pos = rows.iter().position(|(k, _)| k == key)?;
        let row = rows.remove(pos);
        rows.push(row);
        Some(row.1)
    }
}

impl<K: Copy + PartialEq, V: Copy> Remove<K> for MemTable<K, V> {
    fn remove(&self, key: &K) {
        self.rows.borrow_mut().retain(|(k, _)| k != key);
    }
}

impl<K: Copy + PartialEq, V: Copy> Table<K, V> for MemTable<K, V> {
    fn insert(&self, key: &K, value: &V) {
        let mut rows = self.rows.borrow_mut();
        rows.retain(|(k, _)| k != key);
        if rows.len() >= self.capacity {
            rows.remove(0);
        }
        rows.push((*key, *value));
    }

    fn insert_new(&self, key: &K, value: &V) -> bool {
        if self.contains(key) {
            return false;
        }
        Table::insert(self, key, value);
        true
    }
}

/// Handler environment with a manual clock and a recording output
pub struct TestEnv {
    pub pending_connects: MemTable<u64, u64>,
    pub sockets: MemTable<SocketId, ConnectionId>,
    pub connections: MemTable<ConnectionId, Connection>,
    pub requests: MemTable<L7RequestKey, u8>,
    pub destinations: MemTable<IpPort, IpPort>,
    clock: Cell<u64>,
    out: RefCell<Vec<(Channel, TcpEvent)>>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending_connects: MemTable::with_capacity(capacity),
            sockets: MemTable::with_capacity(capacity),
            connections: MemTable::with_capacity(capacity),
            requests: MemTable::with_capacity(capacity),
            destinations: MemTable::with_capacity(capacity),
            clock: Cell::new(1_000_000),
            out: RefCell::new(Vec::new()),
        }
    }

    pub fn advance(&self, ns: u64) {
        self.clock.set(self.clock.get() + ns);
    }

    pub fn emitted(&self) -> Vec<(Channel, TcpEvent)> {
        self.out.borrow().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pending_connects: self.pending_connects.rows(),
            sockets: self.sockets.rows(),
            connections: self.connections.rows(),
            requests: self.requests.rows(),
        }
    }
}

impl Env for TestEnv {
    type PendingConnects = MemTable<u64, u64>;
    type Sockets = MemTable<SocketId, ConnectionId>;
    type Connections = MemTable<ConnectionId, Connection>;
    type Requests = MemTable<L7RequestKey, u8>;
    type Destinations = MemTable<IpPort, IpPort>;

    fn pending_connects(&self) -> &Self::PendingConnects {
        &self.pending_connects
    }

    fn sockets(&self) -> &Self::Sockets {
        &self.sockets
    }

    fn connections(&self) -> &Self::Connections {
        &self.connections
    }

    fn requests(&self) -> &Self::Requests {
        &self.requests
    }

    fn destinations(&self) -> &Self::Destinations {
        &self.destinations
    }

    fn now_ns(&self) -> u64 {
        self.clock.get()
    }

    fn output(&self, channel: Channel, event: &TcpEvent) {
        self.out.borrow_mut().push((channel, *event));
    }
}

/// Contents of the mutable tables, compared without regard to recency order
#[derive(Debug)]
pub struct Snapshot {
    pending_connects: Vec<(u64, u64)>,
    sockets: Vec<(SocketId, ConnectionId)>,
    connections: Vec<(ConnectionId, Connection)>,
    requests: Vec<(L7RequestKey, u8)>,
}

fn same_rows<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|row| b.contains(row))
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        same_rows(&self.pending_connects, &other.pending_connects)
            && same_rows(&self.sockets, &other.sockets)
            && same_rows(&self.connections, &other.connections)
            && same_rows(&self.requests, &other.requests)
    }
}

pub const fn pid_tgid(pid: u32, tid: u32) -> u64 {
    ((pid as u64) << 32) | tid as u64
}

/// IPv4-mapped IPv6 address
pub const fn v4(octets: [u8; 4]) -> [u8; 16] {
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, octets[0], octets[1], octets[2], octets[3],
    ]
}

/// TCP state change between two fixed endpoints
pub fn change(socket: SocketId, old_state: i32, new_state: i32) -> StateChange {
    StateChange {
        socket,
        old_state,
        new_state,
        sport: 40000,
        dport: 443,
        protocol: IPPROTO_TCP,
        saddr: v4([10, 0, 0, 1]),
        daddr: v4([10, 0, 0, 2]),
    }
}
