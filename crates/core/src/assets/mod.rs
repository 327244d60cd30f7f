//! Asset provider: background visual and optional music for a run.

pub mod pixabay;
pub mod placeholder;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::PipelineError,
    types::{BackgroundAsset, Dimensions, VideoFormat},
};

pub use pixabay::PixabaySource;

/// Downloads tried before giving up on stock media.
const MAX_DOWNLOAD_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unusable media: {reason}")]
    Unusable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub url: String,
    pub kind: MediaKind,
    pub dimensions: Dimensions,
    pub duration: Option<f64>,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        want_video: bool,
    ) -> Result<Vec<MediaCandidate>, MediaError>;

    async fn download(&self, candidate: &MediaCandidate, dest: &Path) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetRequest {
    pub format: VideoFormat,
    pub want_video: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredAssets {
    pub background: BackgroundAsset,
    pub music: Option<PathBuf>,
}

pub struct AssetProvider {
    source: Option<Box<dyn MediaSource>>,
    query: String,
    music_path: PathBuf,
    timeout: Duration,
    rng: StdRng,
}

impl AssetProvider {
    pub fn new(
        source: Option<Box<dyn MediaSource>>,
        query: impl Into<String>,
        music_path: PathBuf,
        timeout: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            source,
            query: query.into(),
            music_path,
            timeout,
            rng,
        }
    }

    pub fn from_config(config: &PipelineConfig, rng: StdRng) -> Self {
        let source = config.stock.pixabay_key.as_ref().and_then(|key| {
            PixabaySource::new(key, config.http_timeout)
                .map(|s| Box::new(s) as Box<dyn MediaSource>)
                .map_err(|e| warn!("pixabay source unavailable: {e}"))
                .ok()
        });

        Self::new(
            source,
            &config.stock.query,
            config.music_path.clone(),
            config.http_timeout,
            rng,
        )
    }

    /// Background plus optional music. Never fails while the work directory
    /// is writable: no stock media means a placeholder image.
    pub async fn acquire(
        &mut self,
        request: AssetRequest,
        work_dir: &Path,
    ) -> crate::error::Result<AcquiredAssets> {
        let background = match self.try_stock(request, work_dir).await {
            Some(asset) => asset,
            None => {
                let path = work_dir.join("background.png");
                let dimensions = request.format.dimensions();
                info!(%dimensions, "using placeholder background");
                let target = path.clone();
                tokio::task::spawn_blocking(move || {
                    placeholder::write_placeholder(&target, dimensions).map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| e.to_string())
                .and_then(|written| written)
                .map_err(|reason| PipelineError::AssetUnavailable {
                    reason: format!("placeholder at {}: {reason}", path.display()),
                })?
            }
        };

        let music = self.find_music().await;

        Ok(AcquiredAssets { background, music })
    }

    async fn try_stock(
        &mut self,
        request: AssetRequest,
        work_dir: &Path,
    ) -> Option<BackgroundAsset> {
        let source = self.source.as_ref()?;

        let search = source.search(&self.query, request.want_video);
        let searched = tokio::time::timeout(self.timeout, search)
            .await
            .unwrap_or(Err(MediaError::Timeout(self.timeout)));
        let mut candidates = match searched {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(source = source.name(), "stock search failed: {e}");
                return None;
            }
        };
        if candidates.is_empty() {
            info!(source = source.name(), query = %self.query, "no stock media found");
            return None;
        }
        candidates.shuffle(&mut self.rng);

        for candidate in candidates.iter().take(MAX_DOWNLOAD_ATTEMPTS) {
            let dest = work_dir.join(background_file_name(candidate));
            let downloaded = tokio::time::timeout(self.timeout, source.download(candidate, &dest))
                .await
                .unwrap_or(Err(MediaError::Timeout(self.timeout)))
                .and_then(|()| describe(candidate, &dest));

            match downloaded {
                Ok(asset) => {
                    let dimensions = asset.dimensions();
                    info!(url = %candidate.url, %dimensions, "stock background ready");
                    return Some(asset);
                }
                Err(e) => {
                    warn!(url = %candidate.url, "skipping stock candidate: {e}");
                    let _ = tokio::fs::remove_file(&dest).await;
                }
            }
        }
        None
    }

    async fn find_music(&self) -> Option<PathBuf> {
        match tokio::fs::metadata(&self.music_path).await {
            Ok(meta) if meta.is_file() => {
                info!(path = %self.music_path.display(), "background music found");
                Some(self.music_path.clone())
            }
            _ => {
                debug!(path = %self.music_path.display(), "no background music");
                None
            }
        }
    }
}

fn background_file_name(candidate: &MediaCandidate) -> String {
    match candidate.kind {
        MediaKind::Video => "background.mp4".to_string(),
        MediaKind::Image => {
            let ext = candidate
                .url
                .rsplit('/')
                .next()
                .and_then(|name| name.split('?').next())
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or_else(|| "jpg".to_string());
            format!("background.{ext}")
        }
    }
}

/// Turn a downloaded file into a typed asset, checking it is usable.
fn describe(candidate: &MediaCandidate, path: &Path) -> Result<BackgroundAsset, MediaError> {
    match candidate.kind {
        MediaKind::Image => {
            let (width, height) =
                image::image_dimensions(path).map_err(|e| MediaError::Unusable {
                    reason: e.to_string(),
                })?;
            Ok(BackgroundAsset::Image {
                path: path.to_path_buf(),
                dimensions: Dimensions::new(width, height),
            })
        }
        MediaKind::Video => {
            let source_duration = candidate
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .ok_or_else(|| MediaError::Unusable {
                    reason: "video without duration".into(),
                })?;
            Ok(BackgroundAsset::Video {
                path: path.to_path_buf(),
                dimensions: candidate.dimensions,
                source_duration,
            })
        }
    }
}
