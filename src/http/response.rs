use std::fmt;

use crate::buffer::Overflow;
use crate::http::request::{FIELD_MAX, PATH_MAX};

/// HTTP status codes the server emits.
///
/// - `Ok` (200): Request successful
/// - `NotModified` (304): Conditional GET, resource unchanged
/// - `Forbidden` (403): Resource exists but may not be served
/// - `NotFound` (404): Resource not found
/// - `MethodNotAllowed` (405): HTTP method not supported
/// - `InternalServerError` (500): Server error, also used for malformed requests
///   and unsatisfiable ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 304 Not Modified
    NotModified,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use statik::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotModified => 304,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use statik::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotModified.reason_phrase(), "Not Modified");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotModified => "Not Modified",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// What the body of a response is made of.
///
/// The declaration order is the eviction priority of a connection that is
/// already streaming its body: header-only responses and directory listings
/// are dropped first, file transfers last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ResponseType {
    /// Headers only (304, unsatisfiable range).
    Empty,
    /// Generated HTML index of a directory.
    DirListing,
    /// Generated HTML error page.
    #[default]
    Error,
    /// Bytes of a regular file.
    File,
}

/// Outgoing header fields, in the order they are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseField {
    AcceptRanges,
    Allow,
    LastModified,
    ContentLength,
    ContentRange,
    ContentType,
}

impl ResponseField {
    pub const ALL: [ResponseField; 6] = [
        ResponseField::AcceptRanges,
        ResponseField::Allow,
        ResponseField::LastModified,
        ResponseField::ContentLength,
        ResponseField::ContentRange,
        ResponseField::ContentType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResponseField::AcceptRanges => "Accept-Ranges",
            ResponseField::Allow => "Allow",
            ResponseField::LastModified => "Last-Modified",
            ResponseField::ContentLength => "Content-Length",
            ResponseField::ContentRange => "Content-Range",
            ResponseField::ContentType => "Content-Type",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Inclusive byte range of a file response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub lower: u64,
    pub upper: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.upper - self.lower + 1
    }
}

/// A resolved response, ready to be serialized and streamed.
///
/// `status` is `None` until a request has been answered, and is reset to
/// `None` when a connection is dropped without a response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Option<StatusCode>,
    pub kind: ResponseType,
    /// Normalized path as the client sees it.
    pub path: String,
    /// Path on the local filesystem.
    pub internal_path: String,
    /// Set when normalization altered the requested path.
    pub redirect: bool,
    pub range: ByteRange,
    fields: [String; 6],
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: None,
            kind: ResponseType::Error,
            path: String::with_capacity(PATH_MAX),
            internal_path: String::with_capacity(PATH_MAX),
            redirect: false,
            range: ByteRange::default(),
            fields: std::array::from_fn(|_| String::with_capacity(FIELD_MAX)),
        }
    }

    /// Resets every field while keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.status = None;
        self.kind = ResponseType::Error;
        self.path.clear();
        self.internal_path.clear();
        self.redirect = false;
        self.range = ByteRange::default();
        for field in &mut self.fields {
            field.clear();
        }
    }

    /// Turns this descriptor into an error response for `status`.
    pub fn set_error(&mut self, status: StatusCode) {
        self.clear();
        self.kind = ResponseType::Error;
        self.status = Some(status);
        self.set_field(ResponseField::ContentType, format_args!("{HTML_CONTENT_TYPE}"))
            .ok();
        if status == StatusCode::MethodNotAllowed {
            self.set_field(ResponseField::Allow, format_args!("GET, HEAD"))
                .ok();
        }
    }

    /// Creates an error response descriptor.
    pub fn error(status: StatusCode) -> Self {
        let mut response = Self::new();
        response.set_error(status);
        response
    }

    pub fn field(&self, field: ResponseField) -> Option<&str> {
        let value = self.fields[field.index()].as_str();
        (!value.is_empty()).then_some(value)
    }

    /// Formats a header value. Values are capped at the field length limit;
    /// an overlong value leaves the field empty.
    pub fn set_field(&mut self, field: ResponseField, value: fmt::Arguments<'_>) -> Result<(), Overflow> {
        let slot = &mut self.fields[field.index()];
        slot.clear();
        fmt::Write::write_fmt(slot, value).map_err(|_| Overflow)?;
        if slot.len() >= FIELD_MAX {
            slot.clear();
            return Err(Overflow);
        }
        Ok(())
    }

    /// Populated header fields in serialization order.
    pub fn fields(&self) -> impl Iterator<Item = (ResponseField, &str)> {
        ResponseField::ALL
            .into_iter()
            .filter_map(|f| self.field(f).map(|v| (f, v)))
    }

    /// Whether a GET for this response streams a body after the header.
    pub fn has_body(&self) -> bool {
        self.kind != ResponseType::Empty
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
