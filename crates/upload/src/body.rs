//! Streaming request body: `header → payload → footer`.
//!
//! The total length is known as soon as the source is opened. The payload is
//! read one chunk at a time and never buffered as a whole.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::envelope::Envelope;
use crate::types::UploadSource;

/// Which part of the body the next pull reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Header,
    Payload,
    Footer,
    Done,
}

enum Payload {
    Buffer(Bytes),
    Reader {
        reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
        remaining: u64,
    },
}

/// Forward-only, single-pass producer of the multipart body.
pub struct BodySource {
    segment: Segment,
    header: Bytes,
    payload: Payload,
    footer: Bytes,
    total: u64,
    origin: Option<PathBuf>,
}

impl BodySource {
    /// Opens `source` and frames it with `envelope`.
    ///
    /// Files are opened here; a missing or unreadable file, or a path that
    /// is not a regular file, fails before any byte is produced.
    pub async fn open(source: UploadSource, envelope: &Envelope) -> io::Result<Self> {
        match source {
            UploadSource::Bytes(data) => Ok(Self::from_bytes(data, envelope)),
            UploadSource::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let metadata = file.metadata().await?;
                if !metadata.is_file() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "not a regular file",
                    ));
                }
                debug!(path = %path.display(), size = metadata.len(), "source opened");
                let mut body = Self::from_reader(file, metadata.len(), envelope);
                body.origin = Some(path);
                Ok(body)
            }
        }
    }

    /// Frames an in-memory buffer.
    pub fn from_bytes(data: Bytes, envelope: &Envelope) -> Self {
        let len = data.len() as u64;
        Self::new(Payload::Buffer(data), len, envelope)
    }

    /// Frames exactly `len` bytes read from `reader`.
    ///
    /// Reaching EOF before `len` bytes is an error; bytes past `len` are
    /// never read.
    pub fn from_reader<R>(reader: R, len: u64, envelope: &Envelope) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let payload = Payload::Reader {
            reader: Box::new(reader),
            remaining: len,
        };
        Self::new(payload, len, envelope)
    }

    fn new(payload: Payload, payload_len: u64, envelope: &Envelope) -> Self {
        Self {
            segment: Segment::Header,
            header: envelope.header().clone(),
            payload,
            footer: envelope.footer().clone(),
            total: envelope.overhead() + payload_len,
            origin: None,
        }
    }

    /// Total body length: header + payload + footer.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn is_done(&self) -> bool {
        self.segment == Segment::Done
    }

    /// Returns the next chunk of at most `max` bytes.
    ///
    /// A chunk never spans two segments, so it may be shorter than `max`
    /// even before the end. An empty chunk means end-of-stream.
    pub async fn pull(&mut self, max: usize) -> io::Result<Bytes> {
        if max == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be non-zero",
            ));
        }

        loop {
            match self.segment {
                Segment::Header => {
                    if self.header.is_empty() {
                        self.segment = Segment::Payload;
                        continue;
                    }
                    let n = max.min(self.header.len());
                    return Ok(self.header.split_to(n));
                }
                Segment::Payload => match &mut self.payload {
                    Payload::Buffer(data) => {
                        if data.is_empty() {
                            self.finish_payload();
                            continue;
                        }
                        let n = max.min(data.len());
                        return Ok(data.split_to(n));
                    }
                    Payload::Reader { reader, remaining } => {
                        if *remaining == 0 {
                            self.finish_payload();
                            continue;
                        }
                        let want = (*remaining).min(max as u64) as usize;
                        let mut buf = vec![0u8; want];
                        let n = match reader.read(&mut buf).await {
                            Ok(n) => n,
                            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                            Err(e) => return Err(e),
                        };
                        if n == 0 {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!("source ended {remaining} bytes early"),
                            ));
                        }
                        buf.truncate(n);
                        *remaining -= n as u64;
                        return Ok(Bytes::from(buf));
                    }
                },
                Segment::Footer => {
                    if self.footer.is_empty() {
                        self.segment = Segment::Done;
                        continue;
                    }
                    let n = max.min(self.footer.len());
                    let chunk = self.footer.split_to(n);
                    if self.footer.is_empty() {
                        self.segment = Segment::Done;
                    }
                    return Ok(chunk);
                }
                Segment::Done => return Ok(Bytes::new()),
            }
        }
    }

    /// Drops the payload reader (closing a file) and moves to the footer.
    fn finish_payload(&mut self) {
        self.payload = Payload::Buffer(Bytes::new());
        self.segment = Segment::Footer;
        if let Some(path) = self.origin.take() {
            debug!(path = %path.display(), "source fully read");
        }
    }

    /// Adapts the source into a stream of chunks of at most `chunk_size`.
    ///
    /// The stream ends after the footer, or right after yielding the first
    /// error.
    pub fn into_stream(self, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>> + Send {
        futures_util::stream::unfold(Some(self), move |state| async move {
            let mut source = state?;
            match source.pull(chunk_size).await {
                Ok(chunk) if chunk.is_empty() => None,
                Ok(chunk) => Some((Ok(chunk), Some(source))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
