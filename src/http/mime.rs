//! MIME type detection based on file extensions.

/// Used when the path has no suffix or an unknown one.
pub const DEFAULT_MIME: &str = "text/plain";

/// Looks up the media type for a suffix such as `.png`. The leading dot is required.
pub fn from_suffix(suffix: &str) -> Option<&'static str> {
    let mime = match suffix {
        ".html" => "text/html",
        ".xml" => "text/xml",
        ".xhtml" => "application/xhtml+xml",
        ".txt" => "text/plain",
        ".rtf" => "application/rtf",
        ".pdf" => "application/pdf",
        ".word" => "application/msword",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".au" => "audio/basic",
        ".mpeg" | ".mpg" => "video/mpeg",
        ".avi" => "video/x-msvideo",
        ".gz" => "application/x-gzip",
        ".tar" => "application/x-tar",
        ".css" => "text/css",
        ".js" => "text/javascript",
        _ => return None,
    };
    Some(mime)
}

/// Content type of the file behind `path`, judged by the text after its last `.`.
pub fn for_path(path: &str) -> &'static str {
    path.rfind('.')
        .and_then(|idx| from_suffix(&path[idx..]))
        .unwrap_or(DEFAULT_MIME)
}
