//! End-to-end exchanges over a real socket.

use std::fs;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pagewire::auth::MemoryCredentialStore;
use pagewire::server::{listener, ServerContext};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn write_file(root: &Path, name: &str, contents: &[u8]) {
    let path = root.join(name);
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
}

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(root, "index.html", b"<h1>home</h1>");
    write_file(root, "hello.txt", b"hello world");
    write_file(root, "welcome.html", b"welcome!");
    write_file(root, "error.html", b"go away");
    write_file(root, "400.html", b"bad request page");
    write_file(root, "404.html", b"not found page");
    dir
}

async fn start(root: &Path) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gate = Arc::new(MemoryCredentialStore::with_users([("alice", "pw")]));
    let ctx = Arc::new(ServerContext::new(root, gate));
    tokio::spawn(listener::serve(listener, ctx));
    addr
}

/// Reads one response framed by its `Content-length` header.
async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let len: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-length: "))
        .unwrap()
        .parse()
        .unwrap();

    let mut body = buf[head_end..].to_vec();
    while body.len() < len {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        body.extend_from_slice(&chunk[..n]);
    }
    (head, body)
}

#[tokio::test]
async fn test_keep_alive_serves_two_requests() {
    let dir = site();
    let addr = start(dir.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /hello.txt HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Connection: keep-alive\r\n"));
    assert_eq!(body, b"hello world");

    stream
        .write_all(b"GET /hello.txt HTTP/1.1\r\nConnection: keep-alive\r\nRange: bytes=6-\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 206 Partial Content\r\n"));
    assert!(head.contains("Content-Range: bytes 6-10/11\r\n"));
    assert_eq!(body, b"world");
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let dir = site();
    let addr = start(dir.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET / HT").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(b"TP/1.1\r\nConnection: cl").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(b"ose\r\n\r\n").await.unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(body, b"<h1>home</h1>");

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_close() {
    let dir = site();
    let addr = start(dir.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(body, b"bad request page");

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_missing_file_gets_404_page() {
    let dir = site();
    let addr = start(dir.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /nothing.gif HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(body, b"not found page");
}

#[tokio::test]
async fn test_login_form_routes_by_verdict() {
    let dir = site();
    let addr = start(dir.path()).await;

    for (form, expected) in [
        (&b"username=alice&password=pw"[..], &b"welcome!"[..]),
        (&b"username=alice&password=nope"[..], &b"go away"[..]),
    ] {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut request = format!(
            "POST /login HTTP/1.1\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n",
            form.len()
        )
        .into_bytes();
        request.extend_from_slice(form);
        stream.write_all(&request).await.unwrap();

        let (head, body) = read_response(&mut stream).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, expected);
    }
}

#[tokio::test]
async fn test_head_sends_no_body() {
    let dir = site();
    let addr = start(dir.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"HEAD /hello.txt HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.ends_with("Content-length: 11\r\n\r\n"));
}
