//! Entry point: builds the HTTP client once and hands out execution contexts.

use crate::config::UploaderConfig;
use crate::context::UploadHandle;
use crate::error::UploadError;
use crate::types::UploadRequest;
use crate::worker::UploadWorker;

/// Factory for upload contexts sharing one HTTP client.
///
/// Each context runs exactly one request. The client's connection pool is
/// shared across contexts.
#[derive(Debug, Clone)]
pub struct Uploader {
    http: reqwest::Client,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(config: UploaderConfig) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("shotlift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UploadError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Uses a preconfigured client (proxies, custom roots, tests).
    pub fn with_client(http: reqwest::Client, config: UploaderConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Spawns an idle context. Send it a start command with
    /// [`UploadHandle::start`].
    pub fn context(&self) -> UploadHandle {
        let worker = UploadWorker::new(self.http.clone(), self.config.clone());
        UploadHandle::spawn(worker, self.config.shutdown_grace)
    }

    /// Spawns a context and starts `request` on it.
    pub fn submit(&self, request: UploadRequest) -> UploadHandle {
        let handle = self.context();
        // A freshly spawned context always accepts its first start.
        let _ = handle.start(request);
        handle
    }
}
