//! Streaming multipart upload pipeline.
//!
//! Sends a local file or an in-memory buffer to an image host as a single
//! `multipart/form-data` POST without materializing the body in memory.
//!
//! # Pipeline
//!
//! 1. **Envelope**: multipart header/footer framing around the payload
//! 2. **Body source**: lazy `header → payload → footer` byte producer
//! 3. **Worker**: performs the POST, turns body pulls into progress events
//! 4. **Context**: runs the worker on its own task, commands in, events out
//! 5. **Response**: extracts the remote URL from the JSON reply
//!
//! Callers normally go through [`Uploader::submit`] and consume the
//! returned [`UploadHandle`].

pub mod body;
pub mod boundary;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod progress;
pub mod response;
pub mod types;
pub mod uploader;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use body::BodySource;
pub use boundary::generate_boundary;
pub use config::UploaderConfig;
pub use context::{Command, Teardown, UploadHandle};
pub use envelope::{Envelope, detect_content_type, ensure_extension};
pub use error::{ErrorKind, UploadError};
pub use progress::ProgressMeter;
pub use response::parse_upload_response;
pub use types::{
    RequestState, UploadEvent, UploadProgress, UploadRequest, UploadResult, UploadSource,
    UploadTarget,
};
pub use uploader::Uploader;
pub use worker::UploadWorker;

/// Default size of a single body pull: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Multipart field name the gallery endpoint expects.
pub const DEFAULT_FIELD_NAME: &str = "attachment";

/// Path appended to the configured endpoint for uploads.
pub const GALLERY_PATH: &str = "/gallery";
