use crate::http::request::{FIELD_MAX, Method, PATH_MAX, Request, RequestField};
use crate::http::response::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("method not allowed")]
    InvalidMethod,
    #[error("non-printable byte in request target")]
    InvalidTarget,
    #[error("decoded path is not valid UTF-8")]
    InvalidEncoding,
    #[error("unsupported protocol version")]
    InvalidVersion,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("request component exceeds its length limit")]
    TooLong,
}

impl ParseError {
    /// The status an error response for this failure carries.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::InvalidMethod => StatusCode::MethodNotAllowed,
            _ => StatusCode::InternalServerError,
        }
    }
}

/// Parses a raw request header into `req`.
///
/// `buf` holds the request line and header lines, each terminated by CRLF,
/// with the blank line that ends the header already stripped. `req` is
/// cleared first and its string capacity is reused.
pub fn parse_http_request(buf: &[u8], req: &mut Request) -> Result<(), ParseError> {
    req.clear();

    let header = std::str::from_utf8(buf).map_err(|_| ParseError::InvalidRequest)?;

    // Request line
    let (request_line, mut rest) = header
        .split_once("\r\n")
        .ok_or(ParseError::InvalidRequest)?;

    let (method_str, after_method) = request_line
        .split_once(' ')
        .ok_or(ParseError::InvalidRequest)?;
    req.method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let (target, version) = after_method
        .split_once(' ')
        .ok_or(ParseError::InvalidRequest)?;
    parse_target(target, req)?;

    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(ParseError::InvalidVersion);
    }

    // Headers
    while !rest.is_empty() {
        let (line, next) = rest.split_once("\r\n").ok_or(ParseError::InvalidHeader)?;
        rest = next;

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let Some(field) = RequestField::ALL
            .into_iter()
            .find(|f| key.eq_ignore_ascii_case(f.name()))
        else {
            continue;
        };

        let value = value.trim_matches(|c| c == ' ' || c == '\t');
        if value.len() >= FIELD_MAX {
            return Err(ParseError::TooLong);
        }
        req.set_field(field, value);
    }

    Ok(())
}

/// Splits `path?query#fragment` and percent-decodes the path.
///
/// A '#' that comes before any '?' starts the fragment, so the '?' then
/// belongs to the fragment.
fn parse_target(target: &str, req: &mut Request) -> Result<(), ParseError> {
    if !target.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ParseError::InvalidTarget);
    }

    let (before_fragment, fragment) = match target.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (target, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (before_fragment, None),
    };

    if path.len() >= PATH_MAX {
        return Err(ParseError::TooLong);
    }
    let mut decoded = [0u8; PATH_MAX];
    let n = percent_decode(path.as_bytes(), &mut decoded);
    let decoded = std::str::from_utf8(&decoded[..n]).map_err(|_| ParseError::InvalidEncoding)?;
    req.path.push_str(decoded);

    if let Some(query) = query {
        if query.len() >= FIELD_MAX {
            return Err(ParseError::TooLong);
        }
        req.query.push_str(query);
    }
    if let Some(fragment) = fragment {
        if fragment.len() >= FIELD_MAX {
            return Err(ParseError::TooLong);
        }
        req.fragment.push_str(fragment);
    }

    Ok(())
}

/// Decodes `%XX` escapes (two hex digits) from `src` into `dst`, returning
/// the decoded length. Malformed escapes are copied verbatim. `dst` must be
/// at least as long as `src`.
pub fn percent_decode(src: &[u8], dst: &mut [u8]) -> usize {
    let mut i = 0;
    let mut n = 0;

    while i < src.len() {
        let byte = match (src[i], src.get(i + 1), src.get(i + 2)) {
            (b'%', Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                i += 3;
                (hex_value(hi) << 4) | hex_value(lo)
            }
            (b, _, _) => {
                i += 1;
                b
            }
        };
        dst[n] = byte;
        n += 1;
    }

    n
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let mut req = Request::new();
        parse_http_request(b"GET / HTTP/1.1\r\nHost: example.com\r\n", &mut req).unwrap();

        assert_eq!(req.path, "/");
        assert_eq!(req.host(), Some("example.com"));
    }

    #[test]
    fn decode_mixed_escapes() {
        let mut out = [0u8; 32];
        let n = percent_decode(b"/a%20b%zz%4", &mut out);
        assert_eq!(&out[..n], b"/a b%zz%4");
    }
}
