//! Per-thread event loop.

use std::net::TcpListener;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::server::connection::Step;
use crate::server::queue::{self, Event, Interest, Multiplexer, Token};
use crate::server::table::ConnectionTable;

/// One worker thread's private state. Nothing here is shared except the
/// listening socket and the read-only configuration.
pub struct Worker {
    id: usize,
    cfg: Arc<Config>,
    listener: Arc<TcpListener>,
    queue: Box<dyn Multiplexer>,
    table: ConnectionTable,
    events: Vec<Event>,
}

impl Worker {
    pub fn new(id: usize, cfg: Arc<Config>, listener: Arc<TcpListener>) -> anyhow::Result<Self> {
        let queue = queue::create(cfg.backend, cfg.slots + 1)
            .with_context(|| format!("worker {id}: failed to create multiplexer"))?;
        let table = ConnectionTable::new(cfg.slots);
        let events = Vec::with_capacity(cfg.slots + 1);

        Ok(Self {
            id,
            cfg,
            listener,
            queue,
            table,
            events,
        })
    }

    /// Serves connections until an unrecoverable error occurs.
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.queue
            .add(self.listener.as_raw_fd(), Interest::Read, Token::Listener, true)
            .context("failed to register listening socket")?;
        info!(worker = self.id, slots = self.table.len(), backend = ?self.cfg.backend, "worker started");

        loop {
            self.queue
                .wait(&mut self.events, None)
                .context("failed to wait for events")?;

            for i in 0..self.events.len() {
                let event = self.events[i];
                match event.token {
                    Token::Listener => self.admit()?,
                    Token::Connection(slot, generation) => {
                        self.drive(slot, generation, event.error)?
                    }
                }
            }
        }
    }

    /// Accepts a pending connection, evicting one when the table is full.
    fn admit(&mut self) -> anyhow::Result<()> {
        let slot = match self.table.find_vacant() {
            Some(slot) => slot,
            None => {
                let Some(victim) = self.table.drop_candidate() else {
                    return Ok(());
                };
                self.table[victim].response.status = None;
                self.close(victim)?;
                victim
            }
        };

        let Some(slot) = self.table.accept_into(slot, &self.listener) else {
            return Ok(());
        };
        let Some(fd) = self.table[slot].fd() else {
            return Ok(());
        };
        self.queue
            .add(fd, Interest::Read, self.table.token(slot), false)
            .context("failed to register connection")
    }

    fn drive(&mut self, slot: usize, generation: u32, error: bool) -> anyhow::Result<()> {
        // stale event for a connection closed or replaced earlier in this batch
        if !self.table.is_current(slot, generation) {
            return Ok(());
        }
        if error {
            self.table[slot].response.status = None;
            return self.close(slot);
        }

        match self.table[slot].serve(&self.cfg) {
            Step::Suspend(interest) => match self.table[slot].fd() {
                Some(fd) => self
                    .queue
                    .modify(fd, interest, self.table.token(slot))
                    .context("failed to re-arm connection"),
                None => self.close(slot),
            },
            Step::Close => self.close(slot),
        }
    }

    /// Deregisters, logs and resets a slot, in that order, so the
    /// multiplexer never reports a descriptor that has been closed.
    fn close(&mut self, slot: usize) -> anyhow::Result<()> {
        let conn = &mut self.table[slot];
        if let Some(fd) = conn.fd() {
            self.queue
                .remove(fd)
                .context("failed to deregister connection")?;
        }
        conn.log();
        conn.reset();
        Ok(())
    }
}
