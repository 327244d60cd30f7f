use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::{
    assets::{MediaCandidate, MediaError, MediaKind, MediaSource},
    types::Dimensions,
};

const VIDEO_SEARCH_URL: &str = "https://pixabay.com/api/videos/";
const IMAGE_SEARCH_URL: &str = "https://pixabay.com/api/";
const PER_PAGE: &str = "10";

pub struct PixabaySource {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct VideoSearch {
    hits: Vec<VideoHit>,
}

#[derive(Deserialize)]
struct VideoHit {
    #[serde(default)]
    duration: f64,
    videos: VideoRenditions,
}

#[derive(Deserialize)]
struct VideoRenditions {
    large: Option<Rendition>,
    medium: Option<Rendition>,
    small: Option<Rendition>,
}

#[derive(Deserialize)]
struct Rendition {
    url: String,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct ImageSearch {
    hits: Vec<ImageHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
    image_width: u32,
    image_height: u32,
}

impl PixabaySource {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, MediaError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
        })
    }

    async fn search_videos(&self, query: &str) -> Result<Vec<MediaCandidate>, MediaError> {
        let search = self
            .client
            .get(VIDEO_SEARCH_URL)
            .query(&[("key", self.api_key.as_str()), ("q", query), ("per_page", PER_PAGE)])
            .send()
            .await?
            .error_for_status()?
            .json::<VideoSearch>()
            .await?;

        Ok(video_candidates(search))
    }

    async fn search_images(&self, query: &str) -> Result<Vec<MediaCandidate>, MediaError> {
        let search = self
            .client
            .get(IMAGE_SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("image_type", "photo"),
                ("orientation", "vertical"),
                ("per_page", PER_PAGE),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ImageSearch>()
            .await?;

        Ok(image_candidates(search))
    }
}

fn video_candidates(search: VideoSearch) -> Vec<MediaCandidate> {
    search
        .hits
        .into_iter()
        .filter(|hit| hit.duration > 0.0)
        .filter_map(|hit| {
            // medium is plenty for a 1080p short and downloads fast
            let rendition = [hit.videos.medium, hit.videos.large, hit.videos.small]
                .into_iter()
                .flatten()
                .find(|r| !r.url.is_empty())?;
            Some(MediaCandidate {
                url: rendition.url,
                kind: MediaKind::Video,
                dimensions: Dimensions::new(rendition.width, rendition.height),
                duration: Some(hit.duration),
            })
        })
        .collect()
}

fn image_candidates(search: ImageSearch) -> Vec<MediaCandidate> {
    search
        .hits
        .into_iter()
        .filter(|hit| !hit.large_image_url.is_empty())
        .map(|hit| MediaCandidate {
            url: hit.large_image_url,
            kind: MediaKind::Image,
            dimensions: Dimensions::new(hit.image_width, hit.image_height),
            duration: None,
        })
        .collect()
}

#[async_trait]
impl MediaSource for PixabaySource {
    fn name(&self) -> &'static str {
        "pixabay"
    }

    async fn search(
        &self,
        query: &str,
        want_video: bool,
    ) -> Result<Vec<MediaCandidate>, MediaError> {
        if want_video {
            self.search_videos(query).await
        } else {
            self.search_images(query).await
        }
    }

    async fn download(&self, candidate: &MediaCandidate, dest: &Path) -> Result<(), MediaError> {
        debug!(url = %candidate.url, dest = %dest.display(), "downloading stock media");
        let mut response = self
            .client
            .get(&candidate.url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = fs::File::create(dest).await?;
        let written = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<(), MediaError>(())
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(dest).await;
        }
        written
    }
}
