/// Longest accepted request path, in bytes.
pub const PATH_MAX: usize = 4096;

/// Longest accepted query, fragment or header field value, in bytes.
pub const FIELD_MAX: usize = 200;

/// HTTP request methods.
///
/// Only the two read-only methods are served; any other method is answered
/// with 405 Method Not Allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// GET - Retrieve a resource
    #[default]
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::GET, Method::HEAD];

    /// Parses an HTTP method from a string.
    ///
    /// # Example
    ///
    /// ```
    /// # use statik::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// assert_eq!(Method::from_str("POST"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "HEAD" => Some(Method::HEAD),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
        }
    }
}

/// The request header fields the server looks at. Everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestField {
    Host,
    Range,
    IfModifiedSince,
}

impl RequestField {
    pub const ALL: [RequestField; 3] = [
        RequestField::Host,
        RequestField::Range,
        RequestField::IfModifiedSince,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RequestField::Host => "Host",
            RequestField::Range => "Range",
            RequestField::IfModifiedSince => "If-Modified-Since",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Represents a parsed HTTP request from a client.
///
/// The string fields are reused between requests on the same connection slot:
/// [`Request::clear`] keeps their capacity, so parsing into a warmed-up
/// request does not allocate.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET or HEAD)
    pub method: Method,
    /// Percent-decoded request path (e.g., "/index.html")
    pub path: String,
    /// Raw query string, without the leading '?'
    pub query: String,
    /// Raw fragment, without the leading '#'
    pub fragment: String,
    fields: [String; 3],
}

impl Request {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            path: String::with_capacity(PATH_MAX),
            query: String::with_capacity(FIELD_MAX),
            fragment: String::with_capacity(FIELD_MAX),
            fields: [
                String::with_capacity(FIELD_MAX),
                String::with_capacity(FIELD_MAX),
                String::with_capacity(FIELD_MAX),
            ],
        }
    }

    /// Resets every field while keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.method = Method::GET;
        self.path.clear();
        self.query.clear();
        self.fragment.clear();
        for field in &mut self.fields {
            field.clear();
        }
    }

    /// Retrieves a recognized header value. Returns `None` when the header
    /// was absent or empty.
    pub fn field(&self, field: RequestField) -> Option<&str> {
        let value = self.fields[field.index()].as_str();
        (!value.is_empty()).then_some(value)
    }

    pub fn set_field(&mut self, field: RequestField, value: &str) {
        let slot = &mut self.fields[field.index()];
        slot.clear();
        slot.push_str(value);
    }

    pub fn host(&self) -> Option<&str> {
        self.field(RequestField::Host)
    }

    pub fn range(&self) -> Option<&str> {
        self.field(RequestField::Range)
    }

    pub fn if_modified_since(&self) -> Option<&str> {
        self.field(RequestField::IfModifiedSince)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            request: Request::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    pub fn path(mut self, path: impl AsRef<str>) -> Self {
        self.request.path.push_str(path.as_ref());
        self
    }

    pub fn query(mut self, query: impl AsRef<str>) -> Self {
        self.request.query.push_str(query.as_ref());
        self
    }

    pub fn field(mut self, field: RequestField, value: impl AsRef<str>) -> Self {
        self.request.set_field(field, value.as_ref());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        if self.request.path.is_empty() {
            return Err("path missing");
        }
        Ok(self.request)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
