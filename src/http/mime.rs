//! Content type lookup by file extension.

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

static MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("svg", "image/svg+xml; charset=utf-8"),
    ("txt", "text/plain; charset=utf-8"),
    ("md", "text/plain; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("tar", "application/tar"),
    ("gz", "application/x-gtar"),
    ("pdf", "application/x-pdf"),
    ("swf", "application/x-shockwave-flash"),
    ("jpeg", "image/jpg"),
    ("jpg", "image/jpg"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("webm", "video/webm"),
    ("mp4", "video/mp4"),
];

/// Returns the content type for `path`, judged by the text after its last
/// '.'. Extensions match case-sensitively.
pub fn lookup(path: &str) -> &'static str {
    path.rsplit_once('.')
        .and_then(|(_, ext)| MIME_TYPES.iter().find(|(e, _)| *e == ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}
