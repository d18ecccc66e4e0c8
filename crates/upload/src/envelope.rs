//! Multipart framing around a single file part.
//!
//! ```text
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{field}"; filename="{file_name}"\r\n
//! Content-Type: {content_type}\r\n
//! \r\n
//! {payload}
//! \r\n--{boundary}--\r\n
//! ```

use std::borrow::Cow;
use std::path::Path;

use bytes::Bytes;

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Header and footer bytes that frame the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    boundary: String,
    header: Bytes,
    footer: Bytes,
}

impl Envelope {
    /// Builds the framing for one file part. Pure; never fails.
    pub fn new(boundary: &str, field_name: &str, file_name: &str, content_type: &str) -> Self {
        let header = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            quote_escape(field_name),
            quote_escape(file_name),
            strip_line_breaks(content_type),
        );
        let footer = format!("\r\n--{boundary}--\r\n");

        Self {
            boundary: boundary.to_string(),
            header: Bytes::from(header),
            footer: Bytes::from(footer),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn header(&self) -> &Bytes {
        &self.header
    }

    pub fn footer(&self) -> &Bytes {
        &self.footer
    }

    /// Bytes added around the payload.
    pub fn overhead(&self) -> u64 {
        (self.header.len() + self.footer.len()) as u64
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type_header(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Escapes `\` and `"` and drops line breaks so the value stays inside its
/// quoted parameter.
fn quote_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' | '\n' => out.push(' '),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn strip_line_breaks(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace(['\r', '\n'], ""))
    } else {
        Cow::Borrowed(value)
    }
}

/// Maps an image file extension to its MIME type.
pub fn detect_content_type(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => OCTET_STREAM,
    }
}

/// Appends `.{ext}` unless `name` already ends with it (case-insensitive).
pub fn ensure_extension(name: &str, ext: &str) -> String {
    let suffix = format!(".{}", ext.trim_start_matches('.'));
    if name.to_lowercase().ends_with(&suffix.to_lowercase()) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}
