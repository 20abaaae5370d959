use tracing::{debug, trace};

use crate::buffer::ByteSource;
use crate::http::form;
use crate::http::request::{Method, Request};

/// Result of feeding buffered bytes to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCode {
    /// Not enough bytes yet; read more and call again.
    NoRequest,
    /// A complete, well-formed request is ready, whatever its method.
    GetRequest,
    /// The message is malformed. Nothing more is parsed until `init`.
    BadRequest,
}

/// Where the parser is inside the current message. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
    Finish,
}

/// Paths that are served as `<path>.html`.
const DEFAULT_HTML: [&str; 6] = ["/index", "/register", "/login", "/welcome", "/video", "/picture"];

/// Incremental HTTP/1.1 request parser.
///
/// Call [`RequestParser::parse`] every time new bytes land in the buffer. Whole
/// lines and whole bodies are consumed, a partial line or body is left in the
/// buffer untouched, so the result does not depend on how the bytes were
/// chunked.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    request: Request,
    content_len: usize,
    failed: bool,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            request: Request::default(),
            content_len: 0,
            failed: false,
        }
    }

    /// Resets the parser for the next message on the connection.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// The parsed request, once the parser reached [`ParseState::Finish`].
    pub fn request(&self) -> Option<&Request> {
        (self.state == ParseState::Finish).then_some(&self.request)
    }

    /// Moves the parsed request out. The parser must be `init`ed before reuse.
    pub fn take_request(&mut self) -> Option<Request> {
        if self.state != ParseState::Finish {
            return None;
        }
        Some(std::mem::take(&mut self.request))
    }

    pub fn parse<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> HttpCode {
        if self.failed {
            return HttpCode::BadRequest;
        }
        let code = self.advance(src);
        if code == HttpCode::BadRequest {
            self.failed = true;
        }
        code
    }

    fn advance<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> HttpCode {
        loop {
            match self.state {
                ParseState::RequestLine | ParseState::Headers => {
                    let Some(line) = take_line(src) else {
                        return HttpCode::NoRequest;
                    };
                    let Ok(line) = line else {
                        debug!("request head is not valid UTF-8");
                        return HttpCode::BadRequest;
                    };

                    let code = if self.state == ParseState::RequestLine {
                        self.parse_request_line(&line)
                    } else {
                        self.parse_header(&line)
                    };
                    if code == HttpCode::BadRequest {
                        return code;
                    }
                }
                ParseState::Body => {
                    let buffered = src.peek();
                    if buffered.len() < self.content_len {
                        trace!(have = buffered.len(), need = self.content_len, "body incomplete");
                        return HttpCode::NoRequest;
                    }
                    self.request.body = buffered[..self.content_len].to_vec();
                    src.consume(self.content_len);

                    if let Err(e) = form::decode(&mut self.request) {
                        debug!(error = ?e, path = %self.request.path, "undecodable form body");
                        return HttpCode::BadRequest;
                    }
                    self.state = ParseState::Finish;
                }
                ParseState::Finish => {
                    debug!(
                        method = ?self.request.method,
                        path = %self.request.path,
                        body = self.request.body.len(),
                        "request complete"
                    );
                    return HttpCode::GetRequest;
                }
            }
        }
    }

    /// `METHOD SP PATH[?QUERY] SP HTTP/VERSION`
    fn parse_request_line(&mut self, line: &str) -> HttpCode {
        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            debug!(line, "malformed request line");
            return HttpCode::BadRequest;
        };

        let Some(method) = Method::from_str(method) else {
            debug!(method, "unknown method");
            return HttpCode::BadRequest;
        };
        if target.is_empty() || !version.starts_with("HTTP/") {
            debug!(line, "malformed request line");
            return HttpCode::BadRequest;
        }

        let (path, query) = split_target(target);
        if path.split('/').any(|segment| segment == "..") {
            debug!(path, "path escapes the document root");
            return HttpCode::BadRequest;
        }
        self.request.method = method;
        self.request.path = path;
        self.request.is_download = query.as_deref().is_some_and(has_download_marker);
        self.request.query = query;
        self.request.version = version.to_string();
        self.state = ParseState::Headers;
        HttpCode::NoRequest
    }

    fn parse_header(&mut self, line: &str) -> HttpCode {
        if line.is_empty() {
            return self.end_of_headers();
        }

        let Some((key, value)) = line.split_once(':') else {
            debug!(line, "header line without ':'");
            return HttpCode::BadRequest;
        };
        let key = key.trim();
        if key.is_empty() {
            return HttpCode::BadRequest;
        }
        let value = value.trim();
        if key.eq_ignore_ascii_case("Content-Length")
            && self.request.header(key).is_some_and(|prev| prev != value)
        {
            debug!(value, "conflicting Content-Length");
            return HttpCode::BadRequest;
        }
        self.request.insert_header(key, value.to_string());
        HttpCode::NoRequest
    }

    fn end_of_headers(&mut self) -> HttpCode {
        let content_len = match self.request.header("Content-Length") {
            None => 0,
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    debug!(value = v, "invalid Content-Length");
                    return HttpCode::BadRequest;
                }
            },
        };

        self.content_len = content_len;
        self.state = if content_len == 0 {
            ParseState::Finish
        } else {
            ParseState::Body
        };
        HttpCode::NoRequest
    }
}

/// Takes one CRLF-terminated line off the source, without the terminator.
///
/// `None` means no full line is buffered yet and nothing was consumed.
fn take_line<S: ByteSource + ?Sized>(src: &mut S) -> Option<Result<String, ()>> {
    let buffered = src.peek();
    let end = buffered.windows(2).position(|w| w == b"\r\n")?;
    let line = String::from_utf8(buffered[..end].to_vec()).map_err(|_| ());
    src.consume(end + 2);
    Some(line)
}

/// Splits the request target into a decoded, default-mapped path and the raw query.
pub fn split_target(target: &str) -> (String, Option<String>) {
    let (raw_path, query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q.to_string())),
        None => (target, None),
    };

    let mut path = percent_decode(raw_path);
    if path == "/" {
        path = "/index.html".to_string();
    } else if DEFAULT_HTML.contains(&path.as_str()) {
        path.push_str(".html");
    }
    (path, query)
}

/// Decodes `%XX` escapes. An escape with invalid hex digits is kept as a
/// literal `%` followed by the original characters; `+` is left alone.
pub fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

fn has_download_marker(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes()).any(|(k, _)| k == "download")
}
