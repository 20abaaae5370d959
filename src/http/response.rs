use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::buffer::ByteSink;
use crate::http::etag;
use crate::http::mapping::MappedRegion;
use crate::http::mime;
use crate::http::range::{self, ByteWindow, RangeResolution, RangeSpec};
use crate::http::request::Request;

const HTTP_VERSION: &str = "HTTP/1.1";

/// HTTP status codes the server produces.
///
/// - `Ok` (200): the file is sent whole
/// - `PartialContent` (206): a byte range of the file is sent
/// - `BadRequest` (400): malformed request, also the fallback for unknown codes
/// - `Forbidden` (403): the file is not world-readable
/// - `NotFound` (404): no such file, or a directory
/// - `RangeNotSatisfiable` (416): the requested range does not fit the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 206 Partial Content
    PartialContent,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 416 Range Not Satisfiable
    RangeNotSatisfiable,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use pagewire::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::RangeNotSatisfiable.as_u16(), 416);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::PartialContent => 206,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::RangeNotSatisfiable => 416,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::RangeNotSatisfiable => "Range Not Satisfiable",
        }
    }

    /// The page served in place of the requested file for error codes.
    pub fn error_page(&self) -> Option<&'static str> {
        match self {
            StatusCode::BadRequest => Some("/400.html"),
            StatusCode::Forbidden => Some("/403.html"),
            StatusCode::NotFound => Some("/404.html"),
            StatusCode::RangeNotSatisfiable => Some("/416.html"),
            StatusCode::Ok | StatusCode::PartialContent => None,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            200 => Some(StatusCode::Ok),
            206 => Some(StatusCode::PartialContent),
            400 => Some(StatusCode::BadRequest),
            403 => Some(StatusCode::Forbidden),
            404 => Some(StatusCode::NotFound),
            416 => Some(StatusCode::RangeNotSatisfiable),
            _ => None,
        }
    }
}

/// Codes without an entry in the status table are answered as 400.
impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_u16(code).unwrap_or(StatusCode::BadRequest)
    }
}

/// Parameters advertised in the `keep-alive` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveParams {
    pub max: u32,
    pub timeout_secs: u64,
}

impl Default for KeepAliveParams {
    fn default() -> Self {
        Self {
            max: 6,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FileStat {
    size: u64,
    modified: SystemTime,
}

impl FileStat {
    fn from_metadata(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Builds the response for one resolved file.
///
/// One builder lives per connection and is reused through [`ResponseBuilder::init`].
/// After [`ResponseBuilder::make_response`] the header bytes are in the sink and
/// the body is available through [`ResponseBuilder::file`] as a memory mapping,
/// which stays alive until [`ResponseBuilder::release`] or the next `init`.
///
/// ```ignore
/// let mut builder = ResponseBuilder::default();
/// builder.init("./resources", "/index.html", true, None);
/// builder.make_response(&mut header_buf);
/// stream.write_all(&header_buf).await?;
/// if let Some(body) = builder.file() {
///     stream.write_all(body).await?;
/// }
/// builder.release();
/// ```
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    keep_alive_params: KeepAliveParams,
    src_dir: PathBuf,
    path: String,
    keep_alive: bool,
    code: Option<StatusCode>,
    stat: Option<FileStat>,
    is_download: bool,
    range: Option<RangeSpec>,
    client_etag: Option<u64>,
    window: Option<ByteWindow>,
    mapped: Option<MappedRegion>,
}

impl ResponseBuilder {
    pub fn new(keep_alive_params: KeepAliveParams) -> Self {
        Self {
            keep_alive_params,
            ..Self::default()
        }
    }

    /// Prepares the builder for a new response.
    ///
    /// `code` pins the status; `None` lets the file lookup decide (200 when
    /// the file is there). Any mapping still held from the previous response
    /// is released first.
    pub fn init(
        &mut self,
        src_dir: impl Into<PathBuf>,
        path: impl Into<String>,
        keep_alive: bool,
        code: Option<StatusCode>,
    ) {
        self.release();
        self.src_dir = src_dir.into();
        self.path = path.into();
        self.keep_alive = keep_alive;
        self.code = code;
        self.stat = None;
        self.is_download = false;
        self.range = None;
        self.client_etag = None;
        self.window = None;
    }

    /// Sets the client's range request and the Etag it sent along, if any.
    pub fn set_range(&mut self, range: Option<RangeSpec>, etag: Option<u64>) {
        self.range = range;
        self.client_etag = etag;
    }

    pub fn set_download(&mut self, is_download: bool) {
        self.is_download = is_download;
    }

    /// Copies the range, Etag and download flags of a parsed request.
    pub fn apply_request(&mut self, request: &Request) {
        self.set_range(request.range, request.etag);
        self.set_download(request.is_download);
    }

    /// Resolves the file and writes status line and headers to `sink`.
    ///
    /// The body is mapped, not copied; fetch it with [`ResponseBuilder::file`].
    /// If mapping fails a small HTML error body goes into `sink` instead.
    pub fn make_response<S: ByteSink + ?Sized>(&mut self, sink: &mut S) {
        let target = self.target();
        match fs::metadata(&target) {
            Err(_) => self.code = Some(StatusCode::NotFound),
            Ok(meta) if meta.is_dir() => self.code = Some(StatusCode::NotFound),
            Ok(meta) if !world_readable(&meta) => self.code = Some(StatusCode::Forbidden),
            Ok(meta) => {
                self.stat = Some(FileStat::from_metadata(&meta));
                if self.code.is_none() {
                    self.code = Some(StatusCode::Ok);
                }
            }
        }

        self.error_page();
        self.deal_range();
        self.add_state(sink);
        self.add_header(sink);
        self.add_content(sink);
    }

    /// Status of the last response, `None` before `make_response`.
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    /// Path actually served, after error-page substitution.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The body bytes to send, if a mapping is held.
    pub fn file(&self) -> Option<&[u8]> {
        self.mapped.as_ref().map(MappedRegion::as_slice)
    }

    /// Number of body bytes to send.
    pub fn file_len(&self) -> usize {
        self.file().map_or(0, <[u8]>::len)
    }

    /// The resolved partial-content window of the last response.
    pub fn window(&self) -> Option<ByteWindow> {
        self.window
    }

    pub fn is_range(&self) -> bool {
        self.window.is_some()
    }

    /// The client range still pending for the next `make_response`.
    pub fn requested_range(&self) -> Option<RangeSpec> {
        self.range
    }

    /// Length of the live mapping, alignment padding included.
    pub fn mapped_len(&self) -> Option<usize> {
        self.mapped.as_ref().map(MappedRegion::mapped_len)
    }

    /// Etag of the resolved file.
    pub fn etag(&self) -> Option<u64> {
        self.stat.map(|s| etag::compute(self.file_name(), s.modified))
    }

    /// Unmaps the body and clears the range state.
    ///
    /// Returns the length that was unmapped, which is always the length
    /// that was mapped, or `None` if no mapping was held. The range state
    /// is cleared either way.
    pub fn release(&mut self) -> Option<usize> {
        self.window = None;
        self.range = None;
        let region = self.mapped.take()?;
        let len = region.mapped_len();
        drop(region);
        Some(len)
    }

    /// Writes an inline HTML error page, including its `Content-length`.
    pub fn error_content<S: ByteSink + ?Sized>(&self, sink: &mut S, message: &str) {
        let code = self.code.unwrap_or(StatusCode::BadRequest);
        let body = format!(
            "<html><title>Error</title><body bgcolor=\"ffffff\">{} : {}\n<p>{}</p><hr><em>pagewire</em></body></html>",
            code.as_u16(),
            code.reason_phrase(),
            message
        );
        sink.append_str(&format!("Content-length: {}\r\n\r\n", body.len()));
        sink.append_str(&body);
    }

    fn target(&self) -> PathBuf {
        let mut target = self.src_dir.clone().into_os_string();
        target.push(&self.path);
        PathBuf::from(target)
    }

    fn file_name(&self) -> &str {
        self.path
            .rfind('/')
            .map_or(self.path.as_str(), |idx| &self.path[idx + 1..])
    }

    /// Swaps the target for the error page of the current code.
    fn error_page(&mut self) {
        let Some(page) = self.code.and_then(|c| c.error_page()) else {
            return;
        };
        self.path = page.to_string();
        self.stat = fs::metadata(self.target())
            .ok()
            .filter(|m| m.is_file())
            .map(|m| FileStat::from_metadata(&m));
    }

    fn deal_range(&mut self) {
        if self.code != Some(StatusCode::Ok) {
            return;
        }
        let (Some(spec), Some(stat)) = (self.range, self.stat) else {
            return;
        };

        let stale = match (self.client_etag, self.etag()) {
            (Some(theirs), Some(ours)) => theirs != ours,
            _ => false,
        };

        match range::resolve(spec, stat.size, stale) {
            RangeResolution::Unsatisfiable => {
                debug!(path = %self.path, ?spec, size = stat.size, "range not satisfiable");
                self.code = Some(StatusCode::RangeNotSatisfiable);
                self.is_download = false;
                self.range = None;
                self.error_page();
            }
            RangeResolution::Full => {
                self.range = None;
            }
            RangeResolution::Partial(window) => {
                self.code = Some(StatusCode::PartialContent);
                self.window = Some(window);
            }
        }
    }

    fn add_state<S: ByteSink + ?Sized>(&mut self, sink: &mut S) {
        let code = self.code.unwrap_or(StatusCode::BadRequest);
        self.code = Some(code);
        sink.append_str(&format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            code.as_u16(),
            code.reason_phrase()
        ));
    }

    fn add_header<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        if self.keep_alive {
            sink.append_str("Connection: keep-alive\r\n");
            sink.append_str(&format!(
                "keep-alive: max={}, timeout={}\r\n",
                self.keep_alive_params.max, self.keep_alive_params.timeout_secs
            ));
        } else {
            sink.append_str("Connection: close\r\n");
        }
        sink.append_str(&format!("Content-type: {}\r\n", mime::for_path(&self.path)));

        if self.is_download {
            // A client revalidating with an Etag is streaming, not saving.
            if self.client_etag.is_none() {
                sink.append_str(&format!(
                    "Content-Disposition: attachment; filename={}\r\n",
                    self.file_name()
                ));
            }
            sink.append_str("Accept-Ranges: bytes\r\n");
            if let Some(tag) = self.etag() {
                sink.append_str(&format!("Etag: {tag}\r\n"));
            }
        }

        if let (Some(window), Some(stat)) = (self.window, self.stat) {
            sink.append_str(&format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                window.start(),
                window.end(),
                stat.size
            ));
        }
    }

    fn add_content<S: ByteSink + ?Sized>(&mut self, sink: &mut S) {
        let Some(stat) = self.stat else {
            self.error_content(sink, "File Not Found!");
            return;
        };

        let target = self.target();
        let file = match open_unchanged(&target, stat.size) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cannot open resolved file");
                self.error_content(sink, "File Not Found!");
                return;
            }
        };
        debug!(path = %target.display(), "file path");

        let mapped = match self.window {
            Some(window) => MappedRegion::window(&file, window),
            None if stat.size == 0 => {
                sink.append_str("Content-length: 0\r\n\r\n");
                return;
            }
            None => MappedRegion::full(&file, stat.size),
        };
        drop(file);

        match mapped {
            Ok(region) => {
                sink.append_str(&format!("Content-length: {}\r\n\r\n", region.as_slice().len()));
                self.mapped = Some(region);
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cannot map resolved file");
                self.error_content(sink, "File Not Found!");
            }
        }
    }
}

/// Opens `path` and checks through the open handle that it still has the
/// size it was stat'ed with. Mapping past the end of a file that shrank in
/// between would fault on first access.
fn open_unchanged(path: &Path, expected_len: u64) -> io::Result<File> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len != expected_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("file changed size since stat ({expected_len} -> {len})"),
        ));
    }
    Ok(file)
}

#[cfg(unix)]
fn world_readable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o004 != 0
}

#[cfg(not(unix))]
fn world_readable(_meta: &Metadata) -> bool {
    true
}
