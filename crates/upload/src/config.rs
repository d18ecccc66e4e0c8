//! Tunables for the upload pipeline.

use std::time::Duration;

use crate::DEFAULT_CHUNK_SIZE;

/// Default timeout for establishing the TCP/TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time the transfer may go without any progress.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default grace period for an execution context to quiesce on teardown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(3000);

/// Runtime configuration for [`Uploader`](crate::Uploader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Connect-phase timeout enforced by the HTTP client.
    pub connect_timeout: Duration,
    /// Inactivity timeout: restarted on every body chunk, covers the
    /// wait for the response.
    pub transfer_timeout: Duration,
    /// How long [`UploadHandle::shutdown`](crate::UploadHandle::shutdown)
    /// waits before abandoning the worker task.
    pub shutdown_grace: Duration,
    /// Maximum bytes per body pull.
    pub chunk_size: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl UploaderConfig {
    /// Returns the chunk size, substituting the default for zero.
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}
