//! Upload error types.

use std::error::Error as StdError;
use std::path::Path;

/// Maximum number of characters of an error response body kept as detail.
const MAX_BODY_DETAIL: usize = 512;

/// Coarse classification of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source could not be opened or read.
    LocalIo,
    /// Connection failure, timeout or malformed response.
    Network,
    /// The server answered with a non-2xx status.
    Http,
    /// The user aborted the upload.
    Cancelled,
    /// A start command arrived while the context was not accepting one.
    Busy,
}

/// Errors produced by the upload pipeline.
///
/// Every failure path ends in exactly one of these. Nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("local I/O error: {0}")]
    LocalIo(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}")]
    Http { status: u16, body: String },

    #[error("cancelled")]
    Cancelled,

    #[error("an upload is already in progress")]
    Busy,
}

impl UploadError {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LocalIo(_) => ErrorKind::LocalIo,
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::Http,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Busy => ErrorKind::Busy,
        }
    }

    /// Returns the HTTP status for [`ErrorKind::Http`] errors.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::LocalIo(detail) | Self::Network(detail) => detail.clone(),
            Self::Http { status, body } if body.is_empty() => format!("status {status}"),
            Self::Http { status, body } => format!("status {status}: {body}"),
            Self::Cancelled => "cancelled by user".into(),
            Self::Busy => "an upload is already in progress".into(),
        }
    }

    /// Wraps a failure to open or read the source.
    pub(crate) fn local_io(path: Option<&Path>, err: &std::io::Error) -> Self {
        match path {
            Some(path) => Self::LocalIo(format!("{}: {err}", path.display())),
            None => Self::LocalIo(err.to_string()),
        }
    }

    /// Classifies a transport failure (no HTTP status available).
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        let chain = error_chain(err);
        if err.is_timeout() {
            Self::Network(format!("timed out: {chain}"))
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {chain}"))
        } else {
            Self::Network(chain)
        }
    }

    /// A success status whose body is not the expected JSON.
    pub(crate) fn malformed_response() -> Self {
        Self::Network("malformed response".into())
    }

    /// A non-2xx status; the body is kept only as diagnostic detail.
    pub(crate) fn http(status: u16, body: &str) -> Self {
        let body = body.trim();
        let body = match body.char_indices().nth(MAX_BODY_DETAIL) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        Self::Http { status, body }
    }
}

/// Joins an error with its sources: `outer: inner: root`.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_status() {
        assert_eq!(UploadError::LocalIo("x".into()).kind(), ErrorKind::LocalIo);
        assert_eq!(UploadError::Network("x".into()).kind(), ErrorKind::Network);
        assert_eq!(UploadError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(UploadError::Busy.kind(), ErrorKind::Busy);

        let err = UploadError::http(401, "");
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.http_status(), Some(401));
        assert_eq!(UploadError::Cancelled.http_status(), None);
    }

    #[test]
    fn http_detail_includes_status_and_body() {
        assert_eq!(UploadError::http(401, "").detail(), "status 401");
        assert_eq!(
            UploadError::http(500, "  boom \n").detail(),
            "status 500: boom"
        );
        assert_eq!(UploadError::http(413, "").to_string(), "HTTP 413");
    }

    #[test]
    fn http_body_is_truncated() {
        let long = "x".repeat(MAX_BODY_DETAIL * 2);
        let UploadError::Http { body, .. } = UploadError::http(500, &long) else {
            panic!("expected Http");
        };
        assert_eq!(body.len(), MAX_BODY_DETAIL + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn local_io_names_the_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = UploadError::local_io(Some(Path::new("/tmp/shot.png")), &io);
        assert_eq!(err.kind(), ErrorKind::LocalIo);
        assert!(err.detail().contains("/tmp/shot.png"));
        assert!(err.detail().contains("not found"));
    }

    #[test]
    fn malformed_response_is_network() {
        let err = UploadError::malformed_response();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.detail(), "malformed response");
    }
}
