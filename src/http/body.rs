//! Body producers.
//!
//! Each producer refills a [`Buffer`] from a resumable progress cursor, so a
//! body of any size can be streamed through one bounded buffer across many
//! event-loop wakeups. A producer always starts by clearing the buffer; a
//! call that leaves it empty signals that the body is complete.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;

use crate::buffer::{BUFFER_SIZE, Buffer};
use crate::error::{Error, Result};
use crate::http::response::{Response, ResponseType, StatusCode};

/// Fills `buf` with the next chunk of the body described by `resp`,
/// advancing `progress` past what was produced.
pub fn produce(resp: &Response, buf: &mut Buffer, progress: &mut u64) -> Result<()> {
    match resp.kind {
        ResponseType::File => produce_file(resp, buf, progress),
        ResponseType::DirListing => produce_dir_listing(resp, buf, progress),
        ResponseType::Error => produce_error_page(resp, buf, progress),
        ResponseType::Empty => {
            buf.clear();
            Ok(())
        }
    }
}

/// Streams `resp.range` of the file at `resp.internal_path`. `progress`
/// counts the bytes of the range already produced.
pub fn produce_file(resp: &Response, buf: &mut Buffer, progress: &mut u64) -> Result<()> {
    buf.clear();

    let mut remaining = resp.range.len().saturating_sub(*progress);
    if remaining == 0 {
        return Ok(());
    }

    // the path may have been replaced since it was resolved
    let mut file = File::options()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&resp.internal_path)
        .map_err(|e| Error::from_fs(e, &resp.internal_path))?;
    if !file.metadata()?.is_file() {
        return Err(Error::Forbidden(resp.internal_path.clone().into()));
    }
    file.seek(SeekFrom::Start(resp.range.lower + *progress))?;

    while remaining > 0 && !buf.is_full() {
        let want = buf.remaining().min(remaining.min(usize::MAX as u64) as usize);
        let n = match file.read(&mut buf.spare_mut()[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        buf.advance(n);
        *progress += n as u64;
        remaining -= n as u64;
    }

    Ok(())
}

/// Kind of a directory entry, as far as the listing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    Symlink,
    Fifo,
    Socket,
    Other,
}

impl EntryKind {
    fn of(file_type: fs::FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_fifo() {
            EntryKind::Fifo
        } else if file_type.is_socket() {
            EntryKind::Socket
        } else {
            EntryKind::Other
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            EntryKind::Dir => "/",
            EntryKind::Symlink => "@",
            EntryKind::Fifo => "|",
            EntryKind::Socket => "=",
            EntryKind::Other => "",
        }
    }
}

/// Reads a directory sorted with directories first, then by name.
///
/// The listing is re-read and re-sorted on every refill, so directory
/// listings allocate in steady state, unlike file bodies. Keeping no
/// per-connection copy means a refill always reflects the directory as it
/// is now.
fn sorted_entries(path: &str) -> Result<Vec<(String, EntryKind)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(|_| Error::Forbidden(path.into()))? {
        let entry = entry?;
        let kind = entry
            .file_type()
            .map(EntryKind::of)
            .unwrap_or(EntryKind::Other);
        entries.push((entry.file_name().to_string_lossy().into_owned(), kind));
    }

    entries.sort_by(|(a, ak), (b, bk)| {
        match (*ak == EntryKind::Dir, *bk == EntryKind::Dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.as_bytes().cmp(b.as_bytes()),
        }
    });
    Ok(entries)
}

// Escape targets are sized so that the page header, and any single entry
// line, always fit into an empty buffer.
const TITLE_ESCAPE_MAX: usize = BUFFER_SIZE / 2;
const HREF_ESCAPE_MAX: usize = BUFFER_SIZE / 2;
const NAME_ESCAPE_MAX: usize = BUFFER_SIZE / 4;

const LISTING_FOOTER: &[u8] = b"\n\t</body>\n</html>\n";

/// Streams an HTML index of `resp.internal_path`.
///
/// `progress` is 0 while the page header is still due. After that, a value
/// of `k + 1` means entry `k` of the sorted list is next, `entries.len() + 1`
/// means only the footer is left and `entries.len() + 2` means the listing
/// is done. Hidden entries are skipped but still occupy a position.
pub fn produce_dir_listing(resp: &Response, buf: &mut Buffer, progress: &mut u64) -> Result<()> {
    buf.clear();

    let entries = sorted_entries(&resp.internal_path)?;
    let done = entries.len() as u64 + 1;

    if *progress == 0 {
        let mut title_esc = [0u8; TITLE_ESCAPE_MAX];
        let title = html_escape(&resp.path, &mut title_esc);
        buf.append_fmt(format_args!(
            "<!DOCTYPE html>\n<html>\n\t<head><title>Index of {title}</title></head>\n\
             \t<body>\n\t\t<a href=\"..\">..</a>"
        ))?;
        *progress = 1;
    }

    let mut name_esc = [0u8; NAME_ESCAPE_MAX];
    let mut href_esc = [0u8; HREF_ESCAPE_MAX];
    while *progress < done {
        let (name, kind) = &entries[*progress as usize - 1];
        if !name.starts_with('.') {
            let base_len = html_escape(&resp.path, &mut href_esc).len();
            let href_len = base_len + html_escape(name, &mut href_esc[base_len..]).len();
            let href = std::str::from_utf8(&href_esc[..href_len]).unwrap_or_default();
            let text = html_escape(name, &mut name_esc);

            let slash = if *kind == EntryKind::Dir { "/" } else { "" };
            let fresh = buf.is_empty();
            let line = buf.append_fmt(format_args!(
                "<br />\n\t\t<a href=\"{href}{slash}\">{text}{}</a>",
                kind.suffix()
            ));
            // a line too long for an empty buffer is dropped, not retried
            if line.is_err() && !fresh {
                break;
            }
        }
        *progress += 1;
    }

    if *progress == done && buf.append(LISTING_FOOTER).is_ok() {
        *progress += 1;
    }

    Ok(())
}

/// Emits the HTML error page for `resp.status` on the first call and
/// nothing afterwards.
pub fn produce_error_page(resp: &Response, buf: &mut Buffer, progress: &mut u64) -> Result<()> {
    buf.clear();

    if *progress == 0 {
        let status = resp.status.unwrap_or(StatusCode::InternalServerError);
        let (code, reason) = (status.as_u16(), status.reason_phrase());
        buf.append_fmt(format_args!(
            "<!DOCTYPE html>\n<html>\n\t<head>\n\t\t<title>{code} {reason}</title>\n\t</head>\n\
             \t<body>\n\t\t<h1>{code} {reason}</h1>\n\t</body>\n</html>\n"
        ))?;
        *progress += 1;
    }

    Ok(())
}

/// Escapes `& < > " '` from `src` into `dst` and returns the written part.
///
/// Output that does not fit is dropped silently. Truncation only happens
/// between whole characters or entities.
pub fn html_escape<'a>(src: &str, dst: &'a mut [u8]) -> &'a str {
    let mut n = 0;
    let mut utf8 = [0u8; 4];

    for c in src.chars() {
        let piece: &[u8] = match c {
            '&' => b"&amp;",
            '<' => b"&lt;",
            '>' => b"&gt;",
            '"' => b"&quot;",
            '\'' => b"&#x27;",
            _ => c.encode_utf8(&mut utf8).as_bytes(),
        };
        if n + piece.len() > dst.len() {
            break;
        }
        dst[n..n + piece.len()].copy_from_slice(piece);
        n += piece.len();
    }

    std::str::from_utf8(&dst[..n]).unwrap_or_default()
}
