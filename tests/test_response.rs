use statik::buffer::Buffer;
use statik::http::response::{
    ByteRange, HTML_CONTENT_TYPE, Response, ResponseField, ResponseType, StatusCode,
};
use statik::http::writer::write_header;

fn header_text(resp: &Response) -> String {
    let mut buf = Buffer::new();
    write_header(resp, &mut buf).unwrap();
    String::from_utf8(buf.as_bytes().to_vec()).unwrap()
}

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::NotModified.as_u16(), 304);
    assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::NotModified.reason_phrase(), "Not Modified");
    assert_eq!(StatusCode::Forbidden.reason_phrase(), "Forbidden");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(
        StatusCode::MethodNotAllowed.reason_phrase(),
        "Method Not Allowed"
    );
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Server Error"
    );
}

#[test]
fn test_error_response_fields() {
    let resp = Response::error(StatusCode::MethodNotAllowed);

    assert_eq!(resp.kind, ResponseType::Error);
    assert_eq!(resp.field(ResponseField::ContentType), Some(HTML_CONTENT_TYPE));
    assert_eq!(resp.field(ResponseField::Allow), Some("GET, HEAD"));

    let resp = Response::error(StatusCode::NotFound);
    assert_eq!(resp.field(ResponseField::Allow), None);
}

#[test]
fn test_field_length_limit() {
    let mut resp = Response::new();
    let long = "x".repeat(300);

    assert!(resp.set_field(ResponseField::ContentType, format_args!("{long}")).is_err());
    assert_eq!(resp.field(ResponseField::ContentType), None);
}

#[test]
fn test_byte_range_is_inclusive() {
    assert_eq!(ByteRange { lower: 2, upper: 5 }.len(), 4);
    assert_eq!(ByteRange { lower: 0, upper: 0 }.len(), 1);
}

#[test]
fn test_header_serialization_order() {
    let mut resp = Response::new();
    resp.status = Some(StatusCode::Ok);
    resp.kind = ResponseType::File;
    resp.set_field(ResponseField::ContentType, format_args!("text/plain")).unwrap();
    resp.set_field(ResponseField::ContentLength, format_args!("10")).unwrap();
    resp.set_field(ResponseField::AcceptRanges, format_args!("bytes")).unwrap();

    let text = header_text(&resp);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\nDate: "));
    assert!(text.contains(" GMT\r\nConnection: close\r\n"));
    assert!(text.ends_with(
        "Accept-Ranges: bytes\r\nContent-Length: 10\r\nContent-Type: text/plain\r\n\r\n"
    ));
}

#[test]
fn test_header_without_status_reports_500() {
    let text = header_text(&Response::new());
    assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
}

#[test]
fn test_header_only_responses() {
    let mut resp = Response::new();
    resp.kind = ResponseType::Empty;
    assert!(!resp.has_body());

    resp.clear();
    assert!(resp.has_body());
    assert_eq!(resp.status, None);
    assert_eq!(resp.fields().count(), 0);
}
