//! Decoding of form bodies into fields and uploaded files.
//!
//! Runs once the whole body is buffered, never on a partial body.

use std::collections::HashMap;

use crate::http::request::{FormFile, Request};

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// `multipart/form-data` without a usable `boundary` parameter
    MissingBoundary,
    /// The body never contains the opening delimiter
    MissingDelimiter,
    /// A part whose headers or content are not terminated
    UnterminatedPart,
    /// A part header line without `:`, or garbage after a delimiter
    MalformedPart,
    /// A part without a `name` in its `Content-Disposition`
    MissingName,
}

/// Fields and files decoded from one `multipart/form-data` body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, FormFile>,
}

/// Decodes the request body according to its `Content-Type` and stores the
/// result in `post_fields` / `file_fields`.
///
/// Bodies of any other type are left alone.
pub fn decode(request: &mut Request) -> Result<(), FormError> {
    let Some(content_type) = request.content_type() else {
        return Ok(());
    };
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        URLENCODED => {
            let fields = decode_urlencoded(&request.body);
            request.post_fields.extend(fields);
        }
        MULTIPART => {
            let boundary = boundary(content_type).ok_or(FormError::MissingBoundary)?;
            let form = decode_multipart(&request.body, &boundary)?;
            request.post_fields.extend(form.fields);
            request.file_fields.extend(form.files);
        }
        _ => {}
    }
    Ok(())
}

/// Decodes `a=1&b=hello%20world`.
///
/// `+` is a space, a segment without `=` has an empty value, and an invalid
/// `%XX` escape is kept literally.
pub fn decode_urlencoded(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Extracts the `boundary` parameter of a multipart content type.
pub fn boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

pub fn decode_multipart(body: &[u8], boundary: &str) -> Result<Multipart, FormError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut closing = b"\r\n".to_vec();
    closing.extend_from_slice(&delimiter);

    let mut form = Multipart::default();
    let mut pos = find(body, &delimiter).ok_or(FormError::MissingDelimiter)? + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(if rest.is_empty() {
                FormError::UnterminatedPart
            } else {
                FormError::MalformedPart
            });
        }
        pos += 2;

        let headers_end = find(&body[pos..], b"\r\n\r\n").ok_or(FormError::UnterminatedPart)? + pos;
        let content_start = headers_end + 4;
        let content_end =
            find(&body[content_start..], &closing).ok_or(FormError::UnterminatedPart)? + content_start;

        let part = PartHeaders::parse(&body[pos..headers_end])?;
        let content = &body[content_start..content_end];
        let name = part.name.ok_or(FormError::MissingName)?;

        match part.file_name {
            Some(file_name) => {
                form.files.insert(
                    name,
                    FormFile {
                        file_name,
                        content_type: part.content_type,
                        data: content.to_vec(),
                    },
                );
            }
            None => {
                form.fields
                    .insert(name, String::from_utf8_lossy(content).into_owned());
            }
        }

        pos = content_end + closing.len();
    }
}

#[derive(Default)]
struct PartHeaders {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl PartHeaders {
    fn parse(raw: &[u8]) -> Result<Self, FormError> {
        let raw = std::str::from_utf8(raw).map_err(|_| FormError::MalformedPart)?;
        let mut headers = PartHeaders::default();

        for line in raw.split("\r\n").filter(|l| !l.is_empty()) {
            let (key, value) = line.split_once(':').ok_or(FormError::MalformedPart)?;
            let key = key.trim();
            let value = value.trim();

            if key.eq_ignore_ascii_case("Content-Disposition") {
                for (param, arg) in value.split(';').filter_map(|p| p.split_once('=')) {
                    let arg = arg.trim().trim_matches('"').to_string();
                    match param.trim().to_ascii_lowercase().as_str() {
                        "name" => headers.name = Some(arg),
                        "filename" => headers.file_name = Some(arg),
                        _ => {}
                    }
                }
            } else if key.eq_ignore_ascii_case("Content-Type") {
                headers.content_type = Some(value.to_string());
            }
        }
        Ok(headers)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
