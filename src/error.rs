//! Per-connection error type.
//!
//! Setup code (binding, spawning workers, privilege drop) reports failures
//! with `anyhow`; everything that happens while serving one connection uses
//! [`Error`], which maps onto the status the client should see.

use std::io;
use std::path::PathBuf;

use crate::http::parser::ParseError;
use crate::http::response::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    #[error("access denied: {}", .0.display())]
    Forbidden(PathBuf),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("request path is not absolute")]
    InvalidPath,

    #[error("path exceeds the length limit")]
    PathTooLong,

    #[error("invalid If-Modified-Since date: {0}")]
    InvalidDate(String),

    #[error("buffer capacity exceeded")]
    BufferFull,

    #[error("connection closed by peer")]
    UnexpectedEof,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Parse(e) => e.status(),
            Error::Forbidden(_) => StatusCode::Forbidden,
            Error::NotFound(_) => StatusCode::NotFound,
            _ => StatusCode::InternalServerError,
        }
    }

    /// Maps a failed `stat`/`open` on `path` to a resource error.
    pub fn from_fs(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Error::Forbidden(path.into()),
            io::ErrorKind::NotFound => Error::NotFound(path.into()),
            _ => Error::Io(err),
        }
    }
}

impl From<crate::buffer::Overflow> for Error {
    fn from(_: crate::buffer::Overflow) -> Self {
        Error::BufferFull
    }
}

fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
