use std::fmt;

use async_trait::async_trait;

use crate::types::{Credential, UploadMetadata};

/// Short-lived OAuth access token, held in memory for a single run.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Resumable upload session URI handed out by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub uri: String,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The server holds bytes up to, not including, `next_offset`.
    Incomplete { next_offset: u64 },
    Complete { video_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),
}

/// The OAuth token endpoint plus the resumable upload endpoint.
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn refresh_access_token(&self, credential: &Credential) -> Result<AccessToken, ApiError>;

    async fn start_session(
        &self,
        token: &AccessToken,
        metadata: &UploadMetadata,
        total_bytes: u64,
    ) -> Result<UploadSession, ApiError>;

    /// Send `chunk` as bytes `offset..offset + chunk.len()` of the file.
    async fn put_chunk(
        &self,
        token: &AccessToken,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkOutcome, ApiError>;

    /// Ask the server how much of the file it already has.
    async fn query_offset(
        &self,
        token: &AccessToken,
        session: &UploadSession,
    ) -> Result<ChunkOutcome, ApiError>;
}
