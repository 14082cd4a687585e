use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::trace;

use super::{Event, Interest, Multiplexer, Token, timeout_ms};

/// Edge-triggered epoll.
///
/// Connection registrations are edge-triggered, so a woken connection must
/// be driven until it would block. The shared listener is registered
/// level-triggered with `EPOLLEXCLUSIVE`, which wakes one waiting worker per
/// pending connection instead of all of them.
pub struct EpollQueue {
    epfd: OwnedFd,
    ready: Vec<libc::epoll_event>,
}

impl EpollQueue {
    pub fn new(capacity: usize) -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let epfd = unsafe { OwnedFd::from_raw_fd(fd) };
        let ready = vec![libc::epoll_event { events: 0, u64: 0 }; capacity.max(1)];
        Ok(Self { epfd, ready })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, flags: u32, token: Token) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: flags,
            u64: token.to_u64(),
        };
        let rc = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn direction(interest: Interest) -> u32 {
    match interest {
        Interest::Read => libc::EPOLLIN as u32,
        Interest::Write => libc::EPOLLOUT as u32,
    }
}

impl Multiplexer for EpollQueue {
    fn add(&mut self, fd: RawFd, interest: Interest, token: Token, shared: bool) -> io::Result<()> {
        let mode = if shared {
            libc::EPOLLEXCLUSIVE as u32
        } else {
            libc::EPOLLET as u32
        };
        trace!(fd, ?interest, ?token, shared, "epoll add");
        self.ctl(libc::EPOLL_CTL_ADD, fd, mode | direction(interest), token)
    }

    fn modify(&mut self, fd: RawFd, interest: Interest, token: Token) -> io::Result<()> {
        trace!(fd, ?interest, ?token, "epoll modify");
        self.ctl(
            libc::EPOLL_CTL_MOD,
            fd,
            libc::EPOLLET as u32 | direction(interest),
            token,
        )
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        trace!(fd, "epoll remove");
        let rc = unsafe {
            libc::epoll_ctl(
                self.epfd.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize> {
        events.clear();

        let n = loop {
            let rc = unsafe {
                libc::epoll_wait(
                    self.epfd.as_raw_fd(),
                    self.ready.as_mut_ptr(),
                    self.ready.len() as libc::c_int,
                    timeout_ms(timeout),
                )
            };
            if rc >= 0 {
                break rc as usize;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };

        let io_mask = (libc::EPOLLIN | libc::EPOLLOUT) as u32;
        for ev in &self.ready[..n] {
            let (flags, data) = (ev.events, ev.u64);
            events.push(Event {
                token: Token::from_u64(data),
                error: flags & !io_mask != 0,
            });
        }
        Ok(n)
    }
}
