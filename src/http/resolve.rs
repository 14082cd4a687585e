//! Maps a parsed request onto a filesystem resource.

use std::fs::{self, File, Metadata};
use std::io;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::mime;
use crate::http::request::{PATH_MAX, Request};
use crate::http::response::{
    ByteRange, HTML_CONTENT_TYPE, Response, ResponseField, ResponseType, StatusCode,
};
use crate::http::writer::{HTTP_DATE_FORMAT, http_date};

/// Paths below this prefix may contain hidden segments.
const WELL_KNOWN_PREFIX: &str = "/.well-known/";

/// Lexically normalizes an absolute request path into `out`.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment
/// (staying at the root when there is none). A trailing slash is kept. The
/// filesystem is never consulted. Returns whether the path was altered.
///
/// ```
/// # use statik::http::resolve::normalize_path;
/// let mut out = String::new();
/// assert!(normalize_path("/a//b/../c/.", &mut out).unwrap());
/// assert_eq!(out, "/a/c/");
/// ```
pub fn normalize_path(path: &str, out: &mut String) -> Result<bool> {
    let rest = path.strip_prefix('/').ok_or(Error::InvalidPath)?;

    out.clear();
    out.push('/');
    let mut changed = false;

    let mut segments = rest.split('/').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match segment {
            "" if last => {}
            "" | "." => changed = true,
            ".." => {
                changed = true;
                pop_segment(out);
            }
            name => {
                out.push_str(name);
                if !last {
                    out.push('/');
                }
            }
        }
    }

    Ok(changed)
}

/// Removes the last segment of a path that ends in '/'.
fn pop_segment(path: &mut String) {
    let trimmed = path.trim_end_matches('/').len();
    match path[..trimmed].rfind('/') {
        Some(idx) => path.truncate(idx + 1),
        None => {
            path.clear();
            path.push('/');
        }
    }
}

/// Appends a '/' unless the path already ends with one. Returns whether the
/// path was altered.
fn ensure_dir_slash(path: &mut String) -> Result<bool> {
    if path.ends_with('/') {
        return Ok(false);
    }
    if path.len() + 1 >= PATH_MAX {
        return Err(Error::PathTooLong);
    }
    path.push('/');
    Ok(true)
}

/// Why a `Range` header could not be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError;

/// Evaluates a `Range` header against a file of `size` bytes.
///
/// Supported forms are `bytes=first-last`, `bytes=first-` and
/// `bytes=-suffix`. Multiple ranges are not. `size` must be non-zero.
pub fn parse_range(header: Option<&str>, size: u64) -> std::result::Result<ByteRange, RangeError> {
    let full = ByteRange {
        lower: 0,
        upper: size.checked_sub(1).ok_or(RangeError)?,
    };
    let Some(header) = header.filter(|h| !h.is_empty()) else {
        return Ok(full);
    };

    let spec = header.strip_prefix("bytes=").ok_or(RangeError)?;
    if !spec.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        return Err(RangeError);
    }
    let (first, last) = spec.split_once('-').ok_or(RangeError)?;
    if last.contains('-') {
        return Err(RangeError);
    }

    if !first.is_empty() {
        let lower: u64 = first.parse().map_err(|_| RangeError)?;
        let upper: u64 = if last.is_empty() {
            full.upper
        } else {
            last.parse().map_err(|_| RangeError)?
        };
        if lower > upper || lower >= size {
            return Err(RangeError);
        }
        return Ok(ByteRange {
            lower,
            upper: upper.min(full.upper),
        });
    }

    if last.is_empty() {
        return Err(RangeError);
    }
    let suffix: u64 = last.parse().map_err(|_| RangeError)?;
    if suffix == 0 {
        return Err(RangeError);
    }
    Ok(ByteRange {
        lower: size.saturating_sub(suffix),
        upper: full.upper,
    })
}

/// Derives the response descriptor for `req`.
///
/// Never fails: every resolution error is turned into an error response.
pub fn prepare_response(req: &Request, resp: &mut Response, cfg: &Config) {
    resp.clear();
    if let Err(e) = resolve(req, resp, cfg) {
        debug!(path = %req.path, error = %e, "request resolved to an error response");
        resp.set_error(e.status());
    }
}

fn resolve(req: &Request, resp: &mut Response, cfg: &Config) -> Result<()> {
    resp.redirect = normalize_path(&req.path, &mut resp.path)?;
    // virtual-host and prefix remapping would rewrite resp.path here

    if resp.path.contains("/.") && !resp.path.starts_with(WELL_KNOWN_PREFIX) {
        return Err(Error::Forbidden(resp.path.clone().into()));
    }

    let root = cfg.root.to_string_lossy();
    resp.internal_path.push_str(root.trim_end_matches('/'));
    resp.internal_path.push_str(&resp.path);
    if resp.internal_path.len() >= PATH_MAX {
        return Err(Error::PathTooLong);
    }

    let mut meta = stat(&resp.internal_path)?;

    if meta.is_dir() {
        resp.redirect |= ensure_dir_slash(&mut resp.path)?;
        ensure_dir_slash(&mut resp.internal_path)?;

        let index_len = resp.internal_path.len();
        resp.internal_path.push_str(&cfg.index);
        match fs::metadata(&resp.internal_path) {
            Ok(index_meta) if index_meta.is_file() => meta = index_meta,
            _ => {
                resp.internal_path.truncate(index_len);
                return dir_listing(resp, cfg);
            }
        }
    }

    // fifos and devices would block the worker on open
    if !meta.is_file() {
        return Err(Error::Forbidden(resp.internal_path.clone().into()));
    }

    if let Some(since) = req.if_modified_since() {
        let since = NaiveDateTime::parse_from_str(since, HTTP_DATE_FORMAT)
            .map_err(|_| Error::InvalidDate(since.to_string()))?
            .and_utc()
            .timestamp();
        if modified_secs(&meta) <= since {
            resp.status = Some(StatusCode::NotModified);
            resp.kind = ResponseType::Empty;
            return Ok(());
        }
    }

    let size = meta.len();
    if size == 0 && req.range().is_none() {
        resp.range = ByteRange::default();
        resp.kind = ResponseType::Empty;
        resp.set_field(ResponseField::ContentLength, format_args!("0"))?;
    } else {
        match parse_range(req.range(), size) {
            Ok(range) => resp.range = range,
            Err(RangeError) => {
                resp.status = Some(StatusCode::InternalServerError);
                resp.kind = ResponseType::Empty;
                resp.set_field(ResponseField::ContentRange, format_args!("bytes */{size}"))?;
                return Ok(());
            }
        }
        let range = resp.range;
        resp.kind = ResponseType::File;
        resp.set_field(ResponseField::ContentLength, format_args!("{}", range.len()))?;
        if req.range().is_some() {
            resp.set_field(
                ResponseField::ContentRange,
                format_args!("bytes {}-{}/{}", range.lower, range.upper, size),
            )?;
        }
    }

    File::open(&resp.internal_path).map_err(|e| Error::from_fs(e, &resp.internal_path))?;

    let content_type = mime::lookup(&resp.internal_path);
    resp.status = Some(StatusCode::Ok);
    resp.set_field(ResponseField::AcceptRanges, format_args!("bytes"))?;
    resp.set_field(ResponseField::ContentType, format_args!("{content_type}"))?;
    if let Some(mtime) = DateTime::from_timestamp(modified_secs(&meta), 0) {
        resp.set_field(ResponseField::LastModified, format_args!("{}", http_date(mtime)))?;
    }

    Ok(())
}

fn dir_listing(resp: &mut Response, cfg: &Config) -> Result<()> {
    if !cfg.list_directories {
        return Err(Error::Forbidden(resp.internal_path.clone().into()));
    }
    fs::read_dir(&resp.internal_path)
        .map_err(|_| Error::Forbidden(resp.internal_path.clone().into()))?;

    resp.status = Some(StatusCode::Ok);
    resp.kind = ResponseType::DirListing;
    resp.set_field(ResponseField::ContentType, format_args!("{HTML_CONTENT_TYPE}"))?;
    Ok(())
}

fn stat(path: &str) -> Result<Metadata> {
    fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => Error::Forbidden(path.into()),
        _ => Error::NotFound(path.into()),
    })
}

fn modified_secs(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(p: &str) -> (String, bool) {
        let mut out = String::new();
        let changed = normalize_path(p, &mut out).unwrap();
        (out, changed)
    }

    #[test]
    fn normalize_keeps_clean_paths() {
        assert_eq!(norm("/"), ("/".to_string(), false));
        assert_eq!(norm("/a/b.txt"), ("/a/b.txt".to_string(), false));
        assert_eq!(norm("/a/b/"), ("/a/b/".to_string(), false));
        assert_eq!(norm("/a/.../b"), ("/a/.../b".to_string(), false));
    }

    #[test]
    fn normalize_resolves_dots_and_empty_segments() {
        assert_eq!(norm("//a"), ("/a".to_string(), true));
        assert_eq!(norm("/a/./b"), ("/a/b".to_string(), true));
        assert_eq!(norm("/a/b/.."), ("/a/".to_string(), true));
        assert_eq!(norm("/a/b/../../c"), ("/c".to_string(), true));
        assert_eq!(norm("/.."), ("/".to_string(), true));
        assert_eq!(norm("/../../etc/passwd"), ("/etc/passwd".to_string(), true));
        assert_eq!(norm("/a/."), ("/a/".to_string(), true));
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "/", "//", "/a//b/./c/../d", "/../x/", "/./.", "/a/b/../../..",
            "/x/..y/.z/", "/a/.well-known/../b", "/trailing/.",
        ];
        for input in inputs {
            let (once, _) = norm(input);
            let (twice, changed) = norm(&once);
            assert_eq!(once, twice, "input {input}");
            assert!(!changed, "input {input}");
        }
    }

    #[test]
    fn normalize_rejects_relative_paths() {
        let mut out = String::new();
        assert!(matches!(normalize_path("a/b", &mut out), Err(Error::InvalidPath)));
        assert!(matches!(normalize_path("", &mut out), Err(Error::InvalidPath)));
    }

    #[test]
    fn range_forms() {
        assert_eq!(parse_range(None, 10), Ok(ByteRange { lower: 0, upper: 9 }));
        assert_eq!(parse_range(Some("bytes=2-5"), 10), Ok(ByteRange { lower: 2, upper: 5 }));
        assert_eq!(parse_range(Some("bytes=4-"), 10), Ok(ByteRange { lower: 4, upper: 9 }));
        assert_eq!(parse_range(Some("bytes=3-99"), 10), Ok(ByteRange { lower: 3, upper: 9 }));
        assert_eq!(parse_range(Some("bytes=-3"), 10), Ok(ByteRange { lower: 7, upper: 9 }));
        assert_eq!(parse_range(Some("bytes=-30"), 10), Ok(ByteRange { lower: 0, upper: 9 }));
    }

    #[test]
    fn range_errors() {
        for bad in [
            "bytes=5-2", "bytes=10-", "bytes=-", "bytes=1-2-3", "bytes=1", "items=1-2",
            "bytes=a-b", "bytes=1-2,4-5", "bytes=-0", "bytes=99999999999999999999-",
        ] {
            assert_eq!(parse_range(Some(bad), 10), Err(RangeError), "header {bad}");
        }
        assert_eq!(parse_range(None, 0), Err(RangeError));
    }
}
