//! Per-connection state machine.
//!
//! A connection is driven by repeated calls to [`Connection::serve`], one per
//! readiness event. Each call picks up at the current state, makes as much
//! progress as the socket allows and reports whether the worker should wait
//! for more readiness or tear the connection down.

use std::fmt;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, info};

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::Result;
use crate::http::body;
use crate::http::parser::parse_http_request;
use crate::http::request::{Method, Request};
use crate::http::resolve::prepare_response;
use crate::http::response::Response;
use crate::http::writer::{receive_header, send_buffer, write_header};
use crate::server::queue::Interest;

/// Protocol state, in order of how much work has been invested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ConnState {
    #[default]
    Vacant,
    RecvHeader,
    SendHeader,
    SendBody,
}

/// What the worker should do after [`Connection::serve`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait until the socket is ready in this direction, then serve again.
    Suspend(Interest),
    /// The exchange is over, successfully or not.
    Close,
}

/// One connection slot.
///
/// A slot is occupied while it has a peer. All storage is allocated when the
/// slot is created and reused by every connection that passes through it.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    pub peer: Option<SocketAddr>,
    pub state: ConnState,
    pub request: Request,
    pub response: Response,
    pub buf: Buffer,
    /// Body bytes (or listing entries) already produced.
    pub progress: u64,
    /// Bumped each time the slot takes a new connection; survives resets.
    pub generation: u32,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            stream: None,
            peer: None,
            state: ConnState::Vacant,
            request: Request::new(),
            response: Response::new(),
            buf: Buffer::new(),
            progress: 0,
            generation: 0,
        }
    }

    /// Takes ownership of a freshly accepted, non-blocking stream.
    pub fn open(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.reset();
        self.generation = self.generation.wrapping_add(1);
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.state = ConnState::RecvHeader;
    }

    pub fn is_vacant(&self) -> bool {
        self.peer.is_none()
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.stream.as_ref().map(|s| s.as_raw_fd())
    }

    /// Advances the exchange as far as the socket allows.
    pub fn serve(&mut self, cfg: &Config) -> Step {
        match self.advance(cfg) {
            Ok(step) => step,
            Err(e) => {
                debug!(peer = ?self.peer, state = ?self.state, error = %e, "connection aborted");
                Step::Close
            }
        }
    }

    fn advance(&mut self, cfg: &Config) -> Result<Step> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Step::Close);
        };

        loop {
            match self.state {
                ConnState::Vacant => return Ok(Step::Close),

                ConnState::RecvHeader => {
                    match receive_header(stream, &mut self.buf) {
                        Ok(false) => return Ok(Step::Suspend(Interest::Read)),
                        Ok(true) => {
                            match parse_http_request(self.buf.as_bytes(), &mut self.request) {
                                Ok(()) => prepare_response(&self.request, &mut self.response, cfg),
                                Err(e) => self.response.set_error(e.status()),
                            }
                        }
                        Err(e) => self.response.set_error(e.status()),
                    }

                    write_header(&self.response, &mut self.buf)?;
                    self.state = ConnState::SendHeader;
                }

                ConnState::SendHeader => {
                    send_buffer(stream, &mut self.buf)?;
                    if !self.buf.is_empty() {
                        return Ok(Step::Suspend(Interest::Write));
                    }
                    if self.request.method != Method::GET || !self.response.has_body() {
                        return Ok(Step::Close);
                    }
                    self.state = ConnState::SendBody;
                }

                ConnState::SendBody => {
                    if self.buf.is_empty() {
                        body::produce(&self.response, &mut self.buf, &mut self.progress)?;
                        if self.buf.is_empty() {
                            return Ok(Step::Close);
                        }
                    }
                    send_buffer(stream, &mut self.buf)?;
                    if !self.buf.is_empty() {
                        return Ok(Step::Suspend(Interest::Write));
                    }
                }
            }
        }
    }

    /// Writes the access log record for this connection.
    pub fn log(&self) {
        let Some(peer) = self.peer else {
            return;
        };
        let status: &dyn fmt::Display = match &self.response.status {
            Some(status) => status,
            None => &"dropped",
        };

        info!(
            peer = %peer.ip(),
            status = %status,
            host = or_dash(self.request.host().unwrap_or_default()),
            path = or_dash(&self.request.path),
            query = or_dash(&self.request.query),
            fragment = or_dash(&self.request.fragment),
            "access"
        );
    }

    /// Shuts the socket down, closes it and returns the slot to vacant.
    /// Calling this on a vacant slot does nothing harmful.
    pub fn reset(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.peer = None;
        self.state = ConnState::Vacant;
        self.request.clear();
        self.response.clear();
        self.buf.clear();
        self.progress = 0;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}
