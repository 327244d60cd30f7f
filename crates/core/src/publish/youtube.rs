use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header, redirect::Policy};
use serde::Deserialize;
use tracing::debug;

use crate::{
    publish::api::{AccessToken, ApiError, ChunkOutcome, UploadApi, UploadSession},
    types::{Credential, UploadMetadata},
};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Resumable uploads answer 308 while the transfer is incomplete.
const RESUME_INCOMPLETE: u16 = 308;

/// Slowest uplink a chunk PUT is expected to survive, in bytes per second.
const MIN_UPLOAD_RATE: u64 = 64 * 1024;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Deserialize)]
struct InsertedVideo {
    id: String,
}

pub struct YoutubeApi {
    client: reqwest::Client,
    timeout: Duration,
    token_url: String,
    upload_url: String,
}

impl YoutubeApi {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        Self::with_endpoints(timeout, TOKEN_URL, UPLOAD_URL)
    }

    pub fn with_endpoints(
        timeout: Duration,
        token_url: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        // 308 is part of the protocol here, not a redirect to follow
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ApiError::Permanent(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            token_url: token_url.into(),
            upload_url: upload_url.into(),
        })
    }
}

/// Time allowed for one chunk PUT: the regular request timeout plus the
/// time the chunk takes at [`MIN_UPLOAD_RATE`].
pub(crate) fn chunk_timeout(base: Duration, chunk_bytes: usize) -> Duration {
    base + Duration::from_secs((chunk_bytes as u64).div_ceil(MIN_UPLOAD_RATE))
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transient(e.to_string())
}

/// Map a failed response status onto the retry taxonomy.
pub(crate) fn classify(status: StatusCode, body: &str) -> ApiError {
    let detail = format!("{status}: {}", body.trim());
    match status.as_u16() {
        401 => ApiError::Unauthorized(detail),
        408 | 429 | 500..=599 => ApiError::Transient(detail),
        _ => ApiError::Permanent(detail),
    }
}

fn classify_token_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<TokenError>(body) {
        Ok(err)
            if matches!(
                err.error.as_str(),
                "invalid_grant" | "invalid_client" | "unauthorized_client"
            ) =>
        {
            ApiError::Unauthorized(format!("{}: {}", err.error, err.error_description))
        }
        _ => classify(status, body),
    }
}

/// Next offset from a `Range: bytes=0-N` header; no header means nothing
/// was stored yet.
pub(crate) fn next_offset(range: Option<&str>) -> Result<u64, ApiError> {
    let Some(range) = range else {
        return Ok(0);
    };
    range
        .trim()
        .strip_prefix("bytes=")
        .and_then(|r| r.split_once('-'))
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .ok_or_else(|| ApiError::Transient(format!("unparseable Range header {range:?}")))
}

async fn chunk_outcome(response: reqwest::Response) -> Result<ChunkOutcome, ApiError> {
    let status = response.status();
    if status.as_u16() == RESUME_INCOMPLETE {
        let range = response
            .headers()
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok());
        return Ok(ChunkOutcome::Incomplete {
            next_offset: next_offset(range)?,
        });
    }

    if status.is_success() {
        let video: InsertedVideo = response
            .json()
            .await
            .map_err(|e| {
                ApiError::Permanent(format!("upload finished without a video id: {e}"))
            })?;
        return Ok(ChunkOutcome::Complete { video_id: video.id });
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body))
}

#[async_trait]
impl UploadApi for YoutubeApi {
    async fn refresh_access_token(
        &self,
        credential: &Credential,
    ) -> Result<AccessToken, ApiError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("refresh_token", credential.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status, &body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Permanent(format!("token response: {e}")))?;
        debug!("access token refreshed");
        Ok(AccessToken::new(token.access_token))
    }

    async fn start_session(
        &self,
        token: &AccessToken,
        metadata: &UploadMetadata,
        total_bytes: u64,
    ) -> Result<UploadSession, ApiError> {
        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token.secret())
            .header("X-Upload-Content-Length", total_bytes)
            .header("X-Upload-Content-Type", VIDEO_CONTENT_TYPE)
            .json(&metadata.request_body())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, &body));
        }

        let uri = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Permanent("upload session without Location header".into()))?
            .to_string();
        debug!(total_bytes, "upload session opened");

        Ok(UploadSession { uri, total_bytes })
    }

    async fn put_chunk(
        &self,
        token: &AccessToken,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkOutcome, ApiError> {
        if chunk.is_empty() {
            return Err(ApiError::Permanent(format!("empty chunk at offset {offset}")));
        }
        let last = offset + chunk.len() as u64 - 1;
        let response = self
            .client
            .put(&session.uri)
            .timeout(chunk_timeout(self.timeout, chunk.len()))
            .bearer_auth(token.secret())
            .header(header::CONTENT_TYPE, VIDEO_CONTENT_TYPE)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {offset}-{last}/{}", session.total_bytes),
            )
            .body(chunk)
            .send()
            .await
            .map_err(transport)?;

        chunk_outcome(response).await
    }

    async fn query_offset(
        &self,
        token: &AccessToken,
        session: &UploadSession,
    ) -> Result<ChunkOutcome, ApiError> {
        let response = self
            .client
            .put(&session.uri)
            .bearer_auth(token.secret())
            .header(
                header::CONTENT_RANGE,
                format!("bytes */{}", session.total_bytes),
            )
            .body(Vec::<u8>::new())
            .send()
            .await
            .map_err(transport)?;

        chunk_outcome(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_gives_next_offset() {
        assert_eq!(next_offset(Some("bytes=0-262143")), Ok(262_144));
        assert_eq!(next_offset(None), Ok(0));
        assert!(matches!(next_offset(Some("garbage")), Err(ApiError::Transient(_))));
    }

    #[test]
    fn chunk_timeout_grows_with_chunk_size() {
        let base = Duration::from_secs(30);
        assert_eq!(chunk_timeout(base, 1), Duration::from_secs(31));
        // 8 MiB at 64 KiB/s
        assert_eq!(chunk_timeout(base, 8 * 1024 * 1024), Duration::from_secs(158));
    }

    #[test]
    fn statuses_map_to_retry_classes() {
        let class = |status: StatusCode, body: &str| classify(status, body);
        assert!(matches!(class(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized(_)));
        assert!(matches!(class(StatusCode::SERVICE_UNAVAILABLE, ""), ApiError::Transient(_)));
        assert!(matches!(class(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::Transient(_)));
        assert!(matches!(class(StatusCode::FORBIDDEN, "quotaExceeded"), ApiError::Permanent(_)));
        assert!(matches!(class(StatusCode::BAD_REQUEST, "bad title"), ApiError::Permanent(_)));
    }

    #[test]
    fn revoked_refresh_token_is_unauthorized() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token revoked."}"#;
        assert!(matches!(
            classify_token_error(StatusCode::BAD_REQUEST, body),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_token_error(StatusCode::BAD_GATEWAY, "<html>"),
            ApiError::Transient(_)
        ));
    }
}
