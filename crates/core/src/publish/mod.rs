//! Publisher: OAuth refresh plus a resumable, chunked upload.
//!
//! The access token is fetched before the file is even opened, so a revoked
//! credential fails the run without a single byte sent. Transient failures
//! during the transfer ask the server how much it already holds and resume
//! from there.

pub mod api;
pub mod metadata;
pub mod youtube;

use std::{future::Future, io::SeekFrom, path::Path, time::Duration};

use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result, UploadFailureKind},
    types::{Credential, UploadMetadata},
};

pub use api::{AccessToken, ApiError, ChunkOutcome, UploadApi, UploadSession};
pub use youtube::YoutubeApi;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
}

pub struct Publisher {
    api: Box<dyn UploadApi>,
    chunk_bytes: u64,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(api: Box<dyn UploadApi>, chunk_bytes: u64, retry: RetryPolicy) -> Self {
        Self {
            api,
            chunk_bytes: chunk_bytes.max(1),
            retry,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let api = YoutubeApi::new(config.http_timeout)
            .map_err(|e| PipelineError::upload(UploadFailureKind::Permanent, e))?;
        Ok(Self::new(
            Box::new(api),
            config.upload.chunk_bytes,
            RetryPolicy {
                max_retries: config.upload.max_retries,
                base_delay: config.upload.backoff_base,
                max_delay: MAX_BACKOFF,
            },
        ))
    }

    /// Upload `path` and return the remote video id.
    pub async fn publish(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        credential: &Credential,
        progress: &mut (dyn FnMut(UploadProgress) + Send),
    ) -> Result<String> {
        let token = self
            .retrying("token refresh", || self.api.refresh_access_token(credential))
            .await
            .map_err(token_error)?;

        let mut file = File::open(path).await?;
        let total_bytes = file.metadata().await?.len();
        if total_bytes == 0 {
            return Err(PipelineError::upload(
                UploadFailureKind::Permanent,
                format!("{} is empty", path.display()),
            ));
        }

        let session = self
            .retrying("session start", || {
                self.api.start_session(&token, metadata, total_bytes)
            })
            .await
            .map_err(upload_error)?;
        info!(total_bytes, title = %metadata.title, "upload started");

        let mut reporter = ProgressReporter::new(total_bytes, progress);
        reporter.report(0);

        let mut offset = 0u64;
        let mut attempt = 0u32;
        loop {
            let chunk = read_chunk(&mut file, offset, self.chunk_bytes).await?;
            if chunk.is_empty() {
                return Err(PipelineError::upload(
                    UploadFailureKind::Permanent,
                    format!("file ended at {offset} of {total_bytes} bytes"),
                ));
            }
            let sent = chunk.len() as u64;

            let (outcome, resumed) =
                match self.api.put_chunk(&token, &session, offset, chunk).await {
                    Err(ApiError::Transient(reason)) => {
                        self.back_off(&mut attempt, offset, &reason).await?;
                        match self.api.query_offset(&token, &session).await {
                            Ok(outcome) => (outcome, true),
                            // try the same chunk again; the server will say where it stands
                            Err(ApiError::Transient(reason)) => {
                                debug!("offset query failed: {reason}");
                                continue;
                            }
                            Err(e) => return Err(upload_error(e)),
                        }
                    }
                    Err(e) => return Err(upload_error(e)),
                    Ok(outcome) => (outcome, false),
                };

            match outcome {
                ChunkOutcome::Complete { video_id } => {
                    reporter.report(total_bytes);
                    info!(%video_id, "upload complete");
                    return Ok(video_id);
                }
                ChunkOutcome::Incomplete { next_offset } => {
                    if next_offset > total_bytes {
                        return Err(PipelineError::upload(
                            UploadFailureKind::Permanent,
                            format!("server acknowledged {next_offset} of {total_bytes} bytes"),
                        ));
                    }
                    debug!(offset, sent, next_offset, "chunk acknowledged");
                    if next_offset > offset {
                        attempt = 0;
                    } else if !resumed {
                        // accepted but nothing stored
                        self.back_off(&mut attempt, offset, "server made no progress")
                            .await?;
                    }
                    offset = next_offset;
                    reporter.report(offset);
                }
            }
        }
    }

    /// Count one failed attempt at `offset` and sleep, or give up once the
    /// retry budget is spent.
    async fn back_off(&self, attempt: &mut u32, offset: u64, reason: &str) -> Result<()> {
        if *attempt >= self.retry.max_retries {
            return Err(PipelineError::upload(
                UploadFailureKind::Transient,
                format!(
                    "gave up at byte {offset} after {} retries: {reason}",
                    self.retry.max_retries
                ),
            ));
        }
        let delay = self.retry.delay(*attempt);
        *attempt += 1;
        warn!(offset, attempt = *attempt, ?delay, "chunk failed, resuming: {reason}");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn retrying<T, F, Fut>(
        &self,
        what: &str,
        mut call: F,
    ) -> std::result::Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(ApiError::Transient(reason)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    warn!(what, attempt, ?delay, "transient failure, retrying: {reason}");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Reports only forward movement.
struct ProgressReporter<'a> {
    total_bytes: u64,
    reported: Option<u64>,
    sink: &'a mut (dyn FnMut(UploadProgress) + Send),
}

impl<'a> ProgressReporter<'a> {
    fn new(total_bytes: u64, sink: &'a mut (dyn FnMut(UploadProgress) + Send)) -> Self {
        Self {
            total_bytes,
            reported: None,
            sink,
        }
    }

    fn report(&mut self, sent_bytes: u64) {
        if self.reported.is_some_and(|prev| sent_bytes <= prev) {
            return;
        }
        self.reported = Some(sent_bytes);
        (self.sink)(UploadProgress {
            sent_bytes,
            total_bytes: self.total_bytes,
        });
    }
}

async fn read_chunk(file: &mut File, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::with_capacity(len.min(64 * 1024 * 1024) as usize);
    (&mut *file).take(len).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Anything but a network hiccup at the token endpoint means the
/// credential itself is bad.
fn token_error(e: ApiError) -> PipelineError {
    match e {
        ApiError::Unauthorized(reason) | ApiError::Permanent(reason) => {
            PipelineError::AuthFailure { reason }
        }
        ApiError::Transient(reason) => PipelineError::upload(
            UploadFailureKind::Transient,
            format!("token endpoint unreachable: {reason}"),
        ),
    }
}

fn upload_error(e: ApiError) -> PipelineError {
    match e {
        ApiError::Unauthorized(reason) => PipelineError::AuthFailure { reason },
        ApiError::Transient(reason) => PipelineError::upload(UploadFailureKind::Transient, reason),
        ApiError::Permanent(reason) => PipelineError::upload(UploadFailureKind::Permanent, reason),
    }
}
