//! Performs one upload: opens the source, streams the POST, reports
//! progress and classifies the outcome.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::body::BodySource;
use crate::boundary::generate_boundary;
use crate::config::UploaderConfig;
use crate::envelope::Envelope;
use crate::error::UploadError;
use crate::progress::ProgressMeter;
use crate::response::parse_upload_response;
use crate::types::{RequestState, UploadEvent, UploadRequest, UploadResult};

/// Reported by the body stream as the transport pulls from it.
enum TransferSignal {
    Sent(u64),
    SourceFailed(io::Error),
}

/// Owns the HTTP client and drives a single request to a terminal state.
pub struct UploadWorker {
    http: reqwest::Client,
    config: UploaderConfig,
    state: RequestState,
}

impl UploadWorker {
    pub fn new(http: reqwest::Client, config: UploaderConfig) -> Self {
        Self {
            http,
            config,
            state: RequestState::Idle,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn transition(&mut self, next: RequestState) {
        match self.state.advance(next) {
            Some(state) => self.state = state,
            None => debug!(from = ?self.state, to = ?next, "ignored state transition"),
        }
    }

    /// Runs `request` to completion and returns the terminal state.
    ///
    /// Emits zero or more `Progress` events followed by exactly one of
    /// `Completed`, `Failed` or `Cancelled`. A worker that already ran a
    /// request emits `Rejected(Busy)` instead and does nothing else.
    pub async fn upload(
        &mut self,
        request: UploadRequest,
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<UploadEvent>,
    ) -> RequestState {
        if self.state != RequestState::Idle {
            warn!(state = ?self.state, "start rejected: request already in progress");
            let _ = events.send(UploadEvent::Rejected(UploadError::Busy));
            return self.state;
        }

        let (state, event) = match self.perform(request, cancel, events).await {
            Ok(result) => {
                info!(url = %result.remote_url, "upload completed");
                (RequestState::Completed, UploadEvent::Completed(result))
            }
            Err(UploadError::Cancelled) => {
                info!("upload cancelled");
                (RequestState::Cancelled, UploadEvent::Cancelled)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), detail = %e.detail(), "upload failed");
                (RequestState::Failed, UploadEvent::Failed(e))
            }
        };

        self.transition(state);
        let _ = events.send(event);
        self.state
    }

    async fn perform(
        &mut self,
        request: UploadRequest,
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<UploadEvent>,
    ) -> Result<UploadResult, UploadError> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let UploadRequest {
            source,
            field_name,
            file_name,
            content_type,
            target,
        } = request;

        let auth = HeaderValue::from_str(&target.auth_token).map_err(|_| {
            UploadError::Network("auth token is not a valid header value".into())
        })?;

        self.transition(RequestState::Opening);

        let url = target.upload_url();
        let boundary = generate_boundary();
        let envelope = Envelope::new(&boundary, &field_name, &file_name, &content_type);
        let local_path: Option<PathBuf> = source.local_path().map(Path::to_path_buf);

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            opened = BodySource::open(source, &envelope) => {
                opened.map_err(|e| UploadError::local_io(local_path.as_deref(), &e))?
            }
        };
        let total = body.total_len();

        self.transition(RequestState::Sending);
        info!(%url, file = %file_name, bytes = total, "upload started");
        debug!(%boundary, %content_type, "multipart envelope built");

        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let stream = counted(body.into_stream(self.config.effective_chunk_size()), signal_tx);

        let send = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, envelope.content_type_header())
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send();
        tokio::pin!(send);

        let stall = self.config.transfer_timeout;
        let deadline = tokio::time::sleep(stall);
        tokio::pin!(deadline);

        let mut meter = ProgressMeter::new();
        let mut source_error: Option<io::Error> = None;

        let response = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                Some(signal) = signals.recv() => match signal {
                    TransferSignal::Sent(sent) => {
                        deadline.as_mut().reset(Instant::now() + stall);
                        let progress = meter.observe(sent, total);
                        trace!(sent, total, percent = progress.percent, "chunk sent");
                        let _ = events.send(UploadEvent::Progress(progress));
                    }
                    TransferSignal::SourceFailed(e) => {
                        warn!(error = %e, "source read failed mid-transfer");
                        source_error = Some(e);
                    }
                },
                result = &mut send => match result {
                    Ok(response) => break response,
                    Err(e) => {
                        while let Ok(signal) = signals.try_recv() {
                            if let TransferSignal::SourceFailed(err) = signal {
                                source_error = Some(err);
                            }
                        }
                        if let Some(err) = source_error {
                            return Err(UploadError::local_io(local_path.as_deref(), &err));
                        }
                        return Err(UploadError::from_transport(&e));
                    }
                },
                _ = &mut deadline => return Err(stalled(stall)),
            }
        };
        drop(signals);

        let status = response.status();
        debug!(status = status.as_u16(), "response received");

        deadline.as_mut().reset(Instant::now() + stall);
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            body = response.bytes() => body,
            _ = &mut deadline => return Err(stalled(stall)),
        };

        if !status.is_success() {
            // The error body is diagnostic only.
            let text = body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            return Err(UploadError::http(status.as_u16(), &text));
        }

        let body = body.map_err(|e| UploadError::from_transport(&e))?;
        parse_upload_response(&body, local_path.as_deref())
    }
}

fn stalled(after: std::time::Duration) -> UploadError {
    UploadError::Network(format!(
        "transfer stalled: no activity for {} ms",
        after.as_millis()
    ))
}

/// Reports running byte counts and read failures as chunks are pulled.
fn counted<S>(
    stream: S,
    signals: mpsc::UnboundedSender<TransferSignal>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    let mut sent = 0u64;
    stream.map(move |item| {
        match &item {
            Ok(chunk) => {
                sent += chunk.len() as u64;
                let _ = signals.send(TransferSignal::Sent(sent));
            }
            Err(e) => {
                let _ = signals.send(TransferSignal::SourceFailed(io::Error::new(
                    e.kind(),
                    e.to_string(),
                )));
            }
        }
        item
    })
}
