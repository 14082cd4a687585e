use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use statik::config::Config;
use statik::http::response::StatusCode;
use statik::server::connection::{ConnState, Connection, Step};
use statik::server::queue::Interest;

fn fixture(name: &str) -> (PathBuf, Config) {
    let root = std::env::temp_dir().join(format!("statik-conn-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    let cfg = Config {
        root: root.clone(),
        ..Config::default()
    };
    (root, cfg)
}

/// Returns a client socket and a server-side connection for it.
fn connect() -> (TcpStream, Connection) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

    let (stream, peer) = listener.accept().unwrap();
    stream.set_nonblocking(true).unwrap();
    let mut conn = Connection::new();
    conn.open(stream, peer);
    (client, conn)
}

/// Serves until the connection asks for something other than more input.
fn serve_past_header(conn: &mut Connection, cfg: &Config) -> Step {
    loop {
        match conn.serve(cfg) {
            Step::Suspend(Interest::Read) => thread::sleep(Duration::from_millis(1)),
            step => return step,
        }
    }
}

fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    (String::from_utf8(raw[..end].to_vec()).unwrap(), raw[end..].to_vec())
}

#[test]
fn test_small_get_completes_in_one_pass() {
    let (root, cfg) = fixture("small");
    fs::write(root.join("hello.txt"), b"hello world").unwrap();
    let (mut client, mut conn) = connect();

    client.write_all(b"GET /hello.txt HTTP/1.1\r\nHost: test\r\n\r\n").unwrap();
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    assert_eq!(conn.response.status, Some(StatusCode::Ok));
    conn.log();
    conn.reset();

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).unwrap();
    let (header, body) = split_response(&raw);
    assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(header.contains("Connection: close\r\n"));
    assert!(header.contains("Content-Length: 11\r\n"));
    assert_eq!(body, b"hello world");

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_head_sends_header_only() {
    let (root, cfg) = fixture("head");
    fs::write(root.join("hello.txt"), b"hello world").unwrap();
    let (mut client, mut conn) = connect();

    client.write_all(b"HEAD /hello.txt HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    assert_eq!(conn.state, ConnState::SendHeader);
    conn.reset();

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).unwrap();
    let (header, body) = split_response(&raw);
    assert!(header.contains("Content-Length: 11\r\n"));
    assert!(body.is_empty());

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_unsupported_method_gets_405() {
    let (root, cfg) = fixture("method");
    let (mut client, mut conn) = connect();

    client.write_all(b"DELETE / HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    conn.reset();

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).unwrap();
    let (header, body) = split_response(&raw);
    assert!(header.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    assert!(header.contains("Allow: GET, HEAD\r\n"));
    assert!(String::from_utf8(body).unwrap().contains("<h1>405 Method Not Allowed</h1>"));

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_header_arriving_in_pieces() {
    let (root, cfg) = fixture("pieces");
    fs::write(root.join("a.txt"), b"A").unwrap();
    let (mut client, mut conn) = connect();

    client.write_all(b"GET /a.txt HT").unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(conn.serve(&cfg), Step::Suspend(Interest::Read));
    assert_eq!(conn.state, ConnState::RecvHeader);
    assert!(!conn.buf.is_empty());

    client.write_all(b"TP/1.1\r\n\r\n").unwrap();
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    assert_eq!(conn.response.status, Some(StatusCode::Ok));

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_oversized_header_is_answered_with_error() {
    let (root, cfg) = fixture("oversized");
    let (mut client, mut conn) = connect();

    let junk = vec![b'a'; 9000];
    let writer = {
        let mut client = client.try_clone().unwrap();
        thread::spawn(move || {
            let _ = client.write_all(b"GET /");
            let _ = client.write_all(&junk);
        })
    };

    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    assert_eq!(conn.response.status, Some(StatusCode::InternalServerError));
    conn.reset();
    writer.join().unwrap();

    let mut raw = Vec::new();
    let _ = client.read_to_end(&mut raw);
    if !raw.is_empty() {
        assert!(raw.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
    }

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_blocked_write_keeps_state_until_drained() {
    let (root, cfg) = fixture("large");
    let data: Vec<u8> = (0..8_000_000u32).map(|i| (i % 253) as u8).collect();
    fs::write(root.join("big.bin"), &data).unwrap();
    let (mut client, mut conn) = connect();

    client.write_all(b"GET /big.bin HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Suspend(Interest::Write));

    // the client is not reading: once the socket buffers fill up, resuming
    // must leave the pending bytes and the cursor exactly as they were
    let mut stalled = false;
    for _ in 0..100 {
        let (pending, progress) = (conn.buf.as_bytes().to_vec(), conn.progress);
        assert_eq!(conn.serve(&cfg), Step::Suspend(Interest::Write));
        assert_eq!(conn.state, ConnState::SendBody);

        let end = conn.progress as usize;
        assert_eq!(conn.buf.as_bytes(), &data[end - conn.buf.len()..end]);
        if conn.progress == progress && conn.buf.as_bytes() == &pending[..] {
            stalled = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(stalled);
    assert!(conn.progress < data.len() as u64);

    let reader = thread::spawn(move || {
        let mut raw = Vec::new();
        client.read_to_end(&mut raw).unwrap();
        raw
    });

    loop {
        match conn.serve(&cfg) {
            Step::Close => break,
            Step::Suspend(_) => thread::sleep(Duration::from_millis(1)),
        }
    }
    assert_eq!(conn.progress, data.len() as u64);
    conn.reset();

    let raw = reader.join().unwrap();
    let (header, body) = split_response(&raw);
    assert!(header.contains("Content-Length: 8000000\r\n"));
    assert_eq!(body, data);

    fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_peer_closing_early() {
    let (root, cfg) = fixture("early");
    let (client, mut conn) = connect();

    drop(client);
    assert_eq!(serve_past_header(&mut conn, &cfg), Step::Close);
    conn.reset();
    assert!(conn.is_vacant());
    assert_eq!(conn.fd(), None);

    fs::remove_dir_all(root).unwrap();
}
