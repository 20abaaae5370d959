use std::collections::HashMap;

use crate::auth::{CredentialGate, Credentials};
use crate::http::etag;
use crate::http::range::RangeSpec;

/// Page served after a successful login or registration.
pub const WELCOME_PAGE: &str = "/welcome.html";
/// Page served when the credential store rejects the submitted form.
pub const REJECTED_PAGE: &str = "/error.html";

/// Request methods the parser accepts. Every one of them is answered with
/// the resolved file; HEAD just leaves the body off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
}

/// A file part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormFile {
    /// File name as sent by the client.
    pub file_name: String,
    /// The part's own `Content-Type`, if it had one.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A fully parsed HTTP request.
///
/// Only ever handed out once the parser has seen the whole message, body
/// included.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Percent-decoded path, with default pages already mapped (`/` is `/index.html`)
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    /// `HTTP/...` token from the request line
    pub version: String,
    /// Request headers keyed by lower-cased name. A repeated name keeps the last value.
    pub headers: HashMap<String, String>,
    /// Raw body, exactly `Content-Length` bytes
    pub body: Vec<u8>,
    /// Decoded urlencoded fields and non-file multipart parts
    pub post_fields: HashMap<String, String>,
    /// Multipart parts that carried a file name, keyed by field name
    pub file_fields: HashMap<String, FormFile>,
    /// Whether the connection stays open after the response
    pub linger: bool,
    /// Client asked for the file as an attachment (`?download`)
    pub is_download: bool,
    /// Parsed `Range` header
    pub range: Option<RangeSpec>,
    /// Etag token from `If-Range`
    pub etag: Option<u64>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            query: None,
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            post_fields: HashMap::new(),
            file_fields: HashMap::new(),
            linger: true,
            is_download: false,
            range: None,
            etag: None,
        }
    }
}

/// Assembles a [`Request`] without going through the parser.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    post_fields: HashMap<String, String>,
}

impl Method {
    /// Case-sensitive; `None` for anything the server does not know.
    ///
    /// ```
    /// # use pagewire::http::request::Method;
    /// assert_eq!(Method::from_str("HEAD"), Some(Method::HEAD));
    /// assert_eq!(Method::from_str("head"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        const TABLE: [(&str, Method); 7] = [
            ("GET", Method::GET),
            ("POST", Method::POST),
            ("PUT", Method::PUT),
            ("DELETE", Method::DELETE),
            ("HEAD", Method::HEAD),
            ("OPTIONS", Method::OPTIONS),
            ("PATCH", Method::PATCH),
        ];
        TABLE.iter().find(|(name, _)| *name == s).map(|&(_, m)| m)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: Vec::new(),
            body: Vec::new(),
            post_fields: HashMap::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn post_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.post_fields.insert(key.into(), value.into());
        self
    }

    /// Builds the request. Headers go through the same recognition as parsed
    /// ones, so `Connection` or `Range` set the matching fields.
    pub fn build(self) -> Result<Request, &'static str> {
        let mut request = Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            body: self.body,
            post_fields: self.post_fields,
            ..Request::default()
        };
        for (key, value) in self.headers {
            request.insert_header(key, value);
        }
        Ok(request)
    }
}

impl Request {
    /// Retrieves a header value. `key` may be given in any case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Stores a header under its lower-cased name and updates the fields
    /// derived from it.
    pub fn insert_header(&mut self, key: impl Into<String>, value: String) {
        let mut key = key.into();
        key.make_ascii_lowercase();
        match key.as_str() {
            "connection" => self.linger = value.eq_ignore_ascii_case("keep-alive"),
            "range" => self.range = RangeSpec::parse(&value),
            "if-range" => self.etag = etag::parse_token(&value),
            _ => {}
        }
        self.headers.insert(key, value);
    }

    /// Declared body length; 0 when absent or unparsable.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Whether the connection should remain open after the response.
    pub fn keep_alive(&self) -> bool {
        self.linger
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    pub fn is_etag(&self) -> bool {
        self.etag.is_some()
    }

    /// Login or registration data carried by this request, if any.
    ///
    /// Only POSTs to `/login.html` or `/register.html` with both a `username`
    /// and a `password` field qualify.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.method != Method::POST {
            return None;
        }
        let is_login = match self.path.as_str() {
            "/login.html" => true,
            "/register.html" => false,
            _ => return None,
        };
        Some(Credentials {
            username: self.post_fields.get("username")?.clone(),
            password: self.post_fields.get("password")?.clone(),
            is_login,
        })
    }

    /// Routes the request to the welcome page or the rejection page.
    pub fn apply_verdict(&mut self, accepted: bool) {
        let page = if accepted { WELCOME_PAGE } else { REJECTED_PAGE };
        self.path = page.to_string();
    }

    /// Checks [`Request::credentials`] against `gate` and applies the verdict.
    ///
    /// Returns `None` when the request carries no credentials. This may block
    /// on the store; async callers run it on a blocking thread.
    pub fn authenticate(&mut self, gate: &dyn CredentialGate) -> Option<bool> {
        let creds = self.credentials()?;
        let accepted = gate.verify(&creds.username, &creds.password, creds.is_login);
        self.apply_verdict(accepted);
        Some(accepted)
    }
}
