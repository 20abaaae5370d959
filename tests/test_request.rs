use pagewire::auth::{CredentialGate, MemoryCredentialStore};
use pagewire::http::range::RangeSpec;
use pagewire::http::request::{Method, Request, RequestBuilder, REJECTED_PAGE, WELCOME_PAGE};
use std::collections::HashMap;

fn login_request(path: &str, user: &str, password: &str) -> Request {
    RequestBuilder::new()
        .method(Method::POST)
        .path(path)
        .post_field("username", user)
        .post_field("password", password)
        .build()
        .unwrap()
}

#[test]
fn test_request_header_retrieval() {
    let mut headers = HashMap::new();
    headers.insert("host".to_string(), "example.com".to_string());
    headers.insert("content-type".to_string(), "application/json".to_string());

    let req = Request {
        headers,
        ..Request::default()
    };

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("HOST"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .header("Content-Length", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_invalid() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .header("Content-Length", "not-a-number")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_keep_alive_defaults_to_true() {
    let req = RequestBuilder::new().method(Method::GET).path("/").build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_request_connection_header_sets_linger() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("connection", "Keep-Alive")
        .build()
        .unwrap();
    assert!(req.linger);

    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!req.linger);
}

#[test]
fn test_request_builder_recognizes_range_headers() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/movie.avi")
        .header("Range", "bytes=1024-2047")
        .header("If-Range", "W/\"99\"")
        .build()
        .unwrap();

    assert_eq!(req.range, Some(RangeSpec::new(Some(1024), Some(2047))));
    assert_eq!(req.etag, Some(99));
}

#[test]
fn test_request_builder_missing_method() {
    assert!(RequestBuilder::new().path("/").build().is_err());
}

#[test]
fn test_credentials_only_for_form_posts() {
    let req = login_request("/login.html", "alice", "pw");
    let creds = req.credentials().unwrap();
    assert_eq!(creds.username, "alice");
    assert!(creds.is_login);

    let req = login_request("/register.html", "bob", "pw");
    assert!(!req.credentials().unwrap().is_login);

    let req = login_request("/upload", "alice", "pw");
    assert!(req.credentials().is_none());

    let mut req = login_request("/login.html", "alice", "pw");
    req.method = Method::GET;
    assert!(req.credentials().is_none());

    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/login.html")
        .post_field("username", "alice")
        .build()
        .unwrap();
    assert!(req.credentials().is_none());
}

#[test]
fn test_register_then_login() {
    let store = MemoryCredentialStore::new();

    let mut req = login_request("/register.html", "alice", "s3cr3t");
    assert_eq!(req.authenticate(&store), Some(true));
    assert_eq!(req.path, WELCOME_PAGE);

    let mut req = login_request("/login.html", "alice", "s3cr3t");
    assert_eq!(req.authenticate(&store), Some(true));
    assert_eq!(req.path, WELCOME_PAGE);

    let mut req = login_request("/login.html", "alice", "wrong");
    assert_eq!(req.authenticate(&store), Some(false));
    assert_eq!(req.path, REJECTED_PAGE);
}

#[test]
fn test_duplicate_registration_rejected() {
    let store = MemoryCredentialStore::with_users([("alice", "pw")]);

    let mut req = login_request("/register.html", "alice", "other");
    assert_eq!(req.authenticate(&store), Some(false));
    assert_eq!(req.path, REJECTED_PAGE);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_authenticate_without_credentials_leaves_path() {
    let store = MemoryCredentialStore::new();
    let mut req = RequestBuilder::new().method(Method::GET).path("/index.html").build().unwrap();

    assert_eq!(req.authenticate(&store), None);
    assert_eq!(req.path, "/index.html");
}

#[test]
fn test_memory_store_rejects_empty_fields() {
    let store = MemoryCredentialStore::new();

    assert!(!store.verify("", "pw", false));
    assert!(!store.verify("carol", "", false));
    assert!(store.is_empty());
    assert!(!store.verify("nobody", "pw", true));
}

#[test]
fn test_header_names_are_stored_lower_cased() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("X-Trace", "a")
        .header("x-trace", "b")
        .build()
        .unwrap();

    assert_eq!(req.headers.len(), 1);
    assert_eq!(req.headers.get("x-trace").map(String::as_str), Some("b"));
    assert_eq!(req.header("X-TRACE"), Some("b"));
}
