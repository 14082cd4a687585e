use std::fmt;
use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};

use crate::buffer::{Buffer, Overflow};
use crate::error::{Error, Result};
use crate::http::response::{Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// IMF-fixdate, as used by `Date`, `Last-Modified` and `If-Modified-Since`.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats a point in time as an HTTP date without allocating.
pub fn http_date(time: DateTime<Utc>) -> impl fmt::Display {
    time.format(HTTP_DATE_FORMAT)
}

/// Reads from a non-blocking stream until the header terminator arrives.
///
/// Returns `Ok(true)` once the buffer ends with the blank line, which is
/// then stripped so every header line keeps its own CRLF. Returns
/// `Ok(false)` when the stream would block; the bytes read so far stay in
/// the buffer for the next call.
pub fn receive_header<R: Read>(stream: &mut R, buf: &mut Buffer) -> Result<bool> {
    loop {
        match stream.read(buf.spare_mut()) {
            Ok(0) => return Err(Error::UnexpectedEof),
            Ok(n) => {
                buf.advance(n);
                if buf.ends_with(b"\r\n\r\n") {
                    buf.truncate_tail(2);
                    return Ok(true);
                }
                if buf.is_full() {
                    return Err(Error::BufferFull);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Serializes the status line and populated header fields into `buf`,
/// replacing its previous contents.
pub fn write_header(resp: &Response, buf: &mut Buffer) -> std::result::Result<(), Overflow> {
    buf.clear();

    let status = resp.status.unwrap_or(StatusCode::InternalServerError);
    let result = (|| {
        buf.append_fmt(format_args!(
            "{} {} {}\r\nDate: {}\r\nConnection: close\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase(),
            http_date(Utc::now()),
        ))?;

        for (field, value) in resp.fields() {
            buf.append_fmt(format_args!("{}: {}\r\n", field.name(), value))?;
        }

        // Header/body separator
        buf.append(b"\r\n")
    })();

    if result.is_err() {
        buf.clear();
    }
    result
}

/// Writes the buffer to a non-blocking stream, compacting what was sent.
///
/// Returns once the buffer is empty or the stream would block; check
/// [`Buffer::is_empty`] to tell the two apart.
pub fn send_buffer<W: Write>(stream: &mut W, buf: &mut Buffer) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf.as_bytes()) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing",
                ));
            }
            Ok(n) => buf.consume(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
