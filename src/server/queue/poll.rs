use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::trace;

use super::{Event, Interest, Multiplexer, Token, timeout_ms};

/// Level-triggered `poll(2)`.
///
/// Every call scans the whole registered set. A shared listener wakes every
/// worker polling it; the ones that lose the race see `WouldBlock` from
/// `accept`.
pub struct PollQueue {
    fds: Vec<libc::pollfd>,
    tokens: Vec<Token>,
}

impl PollQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            fds: Vec::with_capacity(capacity),
            tokens: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, fd: RawFd) -> io::Result<usize> {
        self.fds
            .iter()
            .position(|p| p.fd == fd)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

fn direction(interest: Interest) -> libc::c_short {
    match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    }
}

impl Multiplexer for PollQueue {
    fn add(&mut self, fd: RawFd, interest: Interest, token: Token, shared: bool) -> io::Result<()> {
        if self.fds.iter().any(|p| p.fd == fd) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        trace!(fd, ?interest, ?token, shared, "poll add");
        self.fds.push(libc::pollfd {
            fd,
            events: direction(interest),
            revents: 0,
        });
        self.tokens.push(token);
        Ok(())
    }

    fn modify(&mut self, fd: RawFd, interest: Interest, token: Token) -> io::Result<()> {
        let idx = self.position(fd)?;
        trace!(fd, ?interest, ?token, "poll modify");
        self.fds[idx].events = direction(interest);
        self.tokens[idx] = token;
        Ok(())
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        let idx = self.position(fd)?;
        trace!(fd, "poll remove");
        self.fds.swap_remove(idx);
        self.tokens.swap_remove(idx);
        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize> {
        events.clear();

        loop {
            let rc = unsafe {
                libc::poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as libc::nfds_t,
                    timeout_ms(timeout),
                )
            };
            if rc >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }

        let io_mask = libc::POLLIN | libc::POLLOUT;
        for (p, token) in self.fds.iter().zip(&self.tokens) {
            if p.revents != 0 {
                events.push(Event {
                    token: *token,
                    error: p.revents & !io_mask != 0,
                });
            }
        }
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    const TICK: Option<Duration> = Some(Duration::from_millis(500));

    #[test]
    fn reports_readiness_with_token() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut queue = PollQueue::new(8);
        let mut events = Vec::new();

        queue.add(a.as_raw_fd(), Interest::Read, Token::Connection(1, 0), false).unwrap();
        assert_eq!(queue.wait(&mut events, Some(Duration::ZERO)).unwrap(), 0);

        b.write_all(b"x").unwrap();
        assert_eq!(queue.wait(&mut events, TICK).unwrap(), 1);
        assert_eq!(events[0], Event { token: Token::Connection(1, 0), error: false });

        // level-triggered: still readable until drained
        assert_eq!(queue.wait(&mut events, TICK).unwrap(), 1);

        queue.modify(a.as_raw_fd(), Interest::Write, Token::Connection(2, 1)).unwrap();
        assert_eq!(queue.wait(&mut events, TICK).unwrap(), 1);
        assert_eq!(events[0].token, Token::Connection(2, 1));

        queue.remove(a.as_raw_fd()).unwrap();
        assert_eq!(queue.wait(&mut events, Some(Duration::ZERO)).unwrap(), 0);
    }

    #[test]
    fn hang_up_sets_error() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut queue = PollQueue::new(1);
        let mut events = Vec::new();

        queue.add(a.as_raw_fd(), Interest::Read, Token::Listener, true).unwrap();
        drop(b);
        assert_eq!(queue.wait(&mut events, TICK).unwrap(), 1);
        assert_eq!(events[0].token, Token::Listener);
        assert!(events[0].error);
    }

    #[test]
    fn duplicate_and_unknown_fds_fail() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut queue = PollQueue::new(1);
        queue.add(a.as_raw_fd(), Interest::Read, Token::Connection(0, 0), false).unwrap();
        assert!(queue.add(a.as_raw_fd(), Interest::Read, Token::Connection(0, 0), false).is_err());
        queue.remove(a.as_raw_fd()).unwrap();
        assert!(queue.modify(a.as_raw_fd(), Interest::Write, Token::Connection(0, 0)).is_err());
    }
}
