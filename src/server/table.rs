use std::cmp::Ordering;
use std::io;
use std::net::TcpListener;
use std::ops::{Index, IndexMut};

use tracing::warn;

use crate::server::connection::{ConnState, Connection};
use crate::server::queue::Token;

/// The fixed set of connection slots owned by one worker.
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Connection>,
}

impl ConnectionTable {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| Connection::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find_vacant(&self) -> Option<usize> {
        self.slots.iter().position(Connection::is_vacant)
    }

    /// Token to register the connection currently in `slot` with.
    pub fn token(&self, slot: usize) -> Token {
        Token::Connection(slot, self.slots[slot].generation)
    }

    /// Whether an event issued for `generation` still refers to the
    /// connection occupying `slot`.
    pub fn is_current(&self, slot: usize, generation: u32) -> bool {
        self.slots
            .get(slot)
            .is_some_and(|conn| !conn.is_vacant() && conn.generation == generation)
    }

    /// Picks the connection to sacrifice when every slot is taken.
    ///
    /// The peer IP holding the most slots gives one up: the connection with
    /// the least invested work, judged by state first, then by response type
    /// while streaming bodies, then by progress. Quadratic in the table size
    /// and allocation-free.
    pub fn drop_candidate(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;

        for (i, conn) in self.slots.iter().enumerate() {
            let Some(ip) = conn.peer.map(|p| p.ip()) else {
                continue;
            };

            let (mut count, mut min) = (0, i);
            for (j, other) in self.slots.iter().enumerate() {
                if other.peer.map(|p| p.ip()) != Some(ip) {
                    continue;
                }
                count += 1;
                if less_important(other, &self.slots[min]) {
                    min = j;
                }
            }

            if best.is_none_or(|(max, _)| count > max) {
                best = Some((count, min));
            }
        }

        best.map(|(_, slot)| slot)
    }

    /// Accepts one pending connection into `slot`, which must be vacant.
    ///
    /// Returns `None` when nothing was pending or the accept failed; failures
    /// other than `WouldBlock` are logged.
    pub fn accept_into(&mut self, slot: usize, listener: &TcpListener) -> Option<usize> {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return None;
            }
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "failed to make connection non-blocking");
            return None;
        }

        self.slots[slot].open(stream, peer);
        Some(slot)
    }
}

fn less_important(a: &Connection, b: &Connection) -> bool {
    match a.state.cmp(&b.state) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => {
            if a.state == ConnState::SendBody && a.response.kind != b.response.kind {
                a.response.kind < b.response.kind
            } else {
                a.progress < b.progress
            }
        }
    }
}

impl Index<usize> for ConnectionTable {
    type Output = Connection;

    fn index(&self, slot: usize) -> &Connection {
        &self.slots[slot]
    }
}

impl IndexMut<usize> for ConnectionTable {
    fn index_mut(&mut self, slot: usize) -> &mut Connection {
        &mut self.slots[slot]
    }
}
