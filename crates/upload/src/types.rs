//! Data types shared by the upload pipeline.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::envelope::detect_content_type;
use crate::error::UploadError;
use crate::{DEFAULT_FIELD_NAME, GALLERY_PATH};

/// Where the payload comes from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A file opened lazily by the worker and read once.
    File(PathBuf),
    /// An owned in-memory buffer.
    Bytes(Bytes),
}

impl UploadSource {
    /// Returns the local path for file sources.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Bytes(_) => None,
        }
    }
}

/// Server endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Base API URL; [`GALLERY_PATH`] is appended.
    pub endpoint: String,
    /// Sent verbatim as the `Authorization` header.
    pub auth_token: String,
}

impl UploadTarget {
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Full upload URL: `{endpoint}/gallery`.
    pub fn upload_url(&self) -> String {
        format!("{}{GALLERY_PATH}", self.endpoint.trim_end_matches('/'))
    }
}

/// A single upload, immutable once submitted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub target: UploadTarget,
}

impl UploadRequest {
    /// Uploads a file. The remote name defaults to the file's own name and
    /// the content type is derived from its extension.
    pub fn file(path: impl Into<PathBuf>, target: UploadTarget) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".into());
        let content_type = detect_content_type(&file_name).to_string();
        Self {
            source: UploadSource::File(path),
            field_name: DEFAULT_FIELD_NAME.into(),
            file_name,
            content_type,
            target,
        }
    }

    /// Uploads an in-memory buffer under `file_name`.
    pub fn bytes(data: impl Into<Bytes>, file_name: impl Into<String>, target: UploadTarget) -> Self {
        let file_name = file_name.into();
        let content_type = detect_content_type(&file_name).to_string();
        Self {
            source: UploadSource::Bytes(data.into()),
            field_name: DEFAULT_FIELD_NAME.into(),
            file_name,
            content_type,
            target,
        }
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }
}

/// Progress of one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    /// `floor(bytes_sent * 100 / bytes_total)`, never decreasing.
    pub percent: u8,
    /// Throughput since the previous notification, in megabits per second.
    /// `None` when the total is unknown.
    pub throughput_mbps: Option<f64>,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

/// Successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Canonical URL reported by the server.
    pub remote_url: String,
    /// Path of the uploaded file, `None` for in-memory sources.
    pub local_path: Option<PathBuf>,
}

impl UploadResult {
    /// Last path segment of the remote URL (e.g. `abc.png`).
    pub fn image_name(&self) -> &str {
        let url = self.remote_url.trim_end_matches('/');
        let url = url.split(['?', '#']).next().unwrap_or(url);
        url.rsplit('/').next().unwrap_or(url)
    }
}

/// Events delivered from an execution context to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Progress update; never follows a terminal event.
    Progress(UploadProgress),
    /// Terminal: upload succeeded.
    Completed(UploadResult),
    /// Terminal: upload failed.
    Failed(UploadError),
    /// Terminal: upload was cancelled.
    Cancelled,
    /// A start command was refused. Not terminal for the active request.
    Rejected(UploadError),
}

impl UploadEvent {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }
}

/// Lifecycle of one request. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Opening,
    Sending,
    Completed,
    Failed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the next state, or `None` if the transition is not allowed.
    pub fn advance(self, next: RequestState) -> Option<RequestState> {
        use RequestState::*;
        match (self, next) {
            (Idle, Opening) | (Opening, Sending) => Some(next),
            (Idle | Opening | Sending, Completed | Failed | Cancelled) => Some(next),
            _ => None,
        }
    }
}
