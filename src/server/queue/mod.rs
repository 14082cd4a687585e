//! Readiness multiplexing.
//!
//! Each worker owns one [`Multiplexer`] and registers the shared listening
//! socket plus the sockets of its own connection slots. Registrations carry
//! a [`Token`] so an event can be routed back to its slot without a lookup.

mod epoll;
mod poll;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::config::Backend;

pub use epoll::EpollQueue;
pub use poll::PollQueue;

/// Readiness a registration waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// What a registered descriptor stands for.
///
/// A connection token carries the generation of the slot it was issued for.
/// Slots are reused, so an event queued for a connection that has since been
/// replaced can be recognized by its outdated generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Listener,
    Connection(usize, u32),
}

impl Token {
    // slot in the low half, generation in the high half; slot indices never
    // reach u32::MAX, so no connection encodes to the listener's value
    fn to_u64(self) -> u64 {
        match self {
            Token::Listener => u64::MAX,
            Token::Connection(slot, generation) => (u64::from(generation) << 32) | slot as u64,
        }
    }

    fn from_u64(raw: u64) -> Self {
        match raw {
            u64::MAX => Token::Listener,
            raw => Token::Connection((raw & u64::from(u32::MAX)) as usize, (raw >> 32) as u32),
        }
    }
}

/// One readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub token: Token,
    /// Set when the descriptor reported anything besides read or write
    /// readiness (error, hang-up).
    pub error: bool,
}

pub trait Multiplexer: Send {
    /// Registers `fd`. A `shared` registration is one that several
    /// multiplexers hold at once (the listening socket); backends that can
    /// avoid waking every holder for it do so.
    fn add(&mut self, fd: RawFd, interest: Interest, token: Token, shared: bool) -> io::Result<()>;

    /// Replaces the interest and token of an existing registration.
    fn modify(&mut self, fd: RawFd, interest: Interest, token: Token) -> io::Result<()>;

    fn remove(&mut self, fd: RawFd) -> io::Result<()>;

    /// Blocks until at least one registration is ready, or until `timeout`
    /// passes, and replaces the contents of `events` with what was
    /// reported. Interrupted waits are retried.
    fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize>;
}

/// Creates the multiplexer selected by `backend`, sized for `capacity`
/// registrations.
pub fn create(backend: Backend, capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    Ok(match backend {
        Backend::Epoll => Box::new(EpollQueue::new(capacity)?),
        Backend::Poll => Box::new(PollQueue::new(capacity)),
    })
}

fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    }
}
