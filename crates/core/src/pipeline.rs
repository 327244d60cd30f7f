//! Sequential driver: content, assets, narration, render, publish.
//!
//! Every stage finishes before the next starts. A failed stage aborts the
//! run and leaves the run directory behind for inspection. Cancellation is
//! checked between stages only.

use std::{fmt, path::PathBuf, sync::Arc};

use chrono::Local;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    assets::{AssetProvider, AssetRequest},
    config::PipelineConfig,
    content::ContentProvider,
    error::{ConfigError, PipelineError, Result},
    narration::Narrator,
    publish::{Publisher, UploadProgress},
    render::{
        CaptionStyle, FfmpegEncoder, FontdueGlyphs, RenderSpec, Renderer, font::resolve_font,
    },
    types::{AudioTrack, PrivacyStatus, UploadMetadata},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Content,
    Assets,
    Narration,
    Render,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Content => "content",
            Stage::Assets => "assets",
            Stage::Narration => "narration",
            Stage::Render => "render",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hooks for progress display. Everything defaults to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _stage: Stage, _summary: &str) {}

    fn stage_failed(&self, _stage: Stage, _error: &PipelineError) {}

    fn upload_progress(&self, _progress: UploadProgress) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub topic: Option<String>,
    pub want_video: bool,
    pub upload: bool,
    pub keep_artifacts: bool,
    /// Overrides the configured privacy status.
    pub privacy: Option<PrivacyStatus>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            topic: None,
            want_video: false,
            upload: true,
            keep_artifacts: false,
            privacy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub title: String,
    pub topic: String,
    pub duration_seconds: f64,
    /// Rendered file, if it was kept.
    pub video_path: Option<PathBuf>,
    pub video_id: Option<String>,
    pub metadata: Option<UploadMetadata>,
}

pub struct Pipeline {
    config: PipelineConfig,
    content: ContentProvider,
    assets: AssetProvider,
    narrator: Narrator,
    renderer: Renderer,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        content: ContentProvider,
        assets: AssetProvider,
        narrator: Narrator,
        renderer: Renderer,
        publisher: Publisher,
    ) -> Self {
        Self {
            config,
            content,
            assets,
            narrator,
            renderer,
            publisher,
        }
    }

    /// Wire the real collaborators. A fixed `seed` makes topic choice and
    /// stock media selection repeatable.
    pub fn from_config(config: PipelineConfig, seed: Option<u64>) -> Result<Self> {
        let mut root = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let content = ContentProvider::from_config(&config, StdRng::seed_from_u64(root.next_u64()));
        let assets = AssetProvider::from_config(&config, StdRng::seed_from_u64(root.next_u64()));
        let narrator = Narrator::new(config.piper_model.clone());

        let font = resolve_font(config.font_path.as_deref()).map_err(|e| ConfigError::Invalid {
            key: "FONT_PATH",
            reason: e.to_string(),
        })?;
        let glyphs = FontdueGlyphs::load(&font).map_err(|e| ConfigError::Invalid {
            key: "FONT_PATH",
            reason: e.to_string(),
        })?;
        let renderer = Renderer::new(
            Arc::new(FfmpegEncoder::new()),
            Arc::new(glyphs),
            CaptionStyle::default(),
        );
        let publisher = Publisher::from_config(&config)?;

        Ok(Self::new(config, content, assets, narrator, renderer, publisher))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(
        &mut self,
        options: &RunOptions,
        observer: &dyn PipelineObserver,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<RunReport> {
        // before anything is rendered
        let credential = if options.upload {
            Some(self.config.validate_for_upload()?.clone())
        } else {
            None
        };

        let run_id = Uuid::new_v4();
        let work_dir = self.config.output_dir.join(run_id.to_string());
        tokio::fs::create_dir_all(&work_dir).await?;
        info!(%run_id, work_dir = %work_dir.display(), "run started");

        observer.stage_started(Stage::Content);
        let content = self
            .content
            .produce(options.topic.as_deref())
            .await
            .inspect_err(|e| observer.stage_failed(Stage::Content, e))?;
        observer.stage_finished(Stage::Content, content.title());
        check_cancelled(shutdown, Stage::Content)?;

        observer.stage_started(Stage::Assets);
        let request = AssetRequest {
            format: self.config.format,
            want_video: options.want_video,
        };
        let assets = self
            .assets
            .acquire(request, &work_dir)
            .await
            .inspect_err(|e| observer.stage_failed(Stage::Assets, e))?;
        let kind = background_kind(assets.background.is_video());
        let summary = match &assets.music {
            Some(_) => format!("{kind} background with music"),
            None => format!("{kind} background"),
        };
        observer.stage_finished(Stage::Assets, &summary);
        check_cancelled(shutdown, Stage::Assets)?;

        observer.stage_started(Stage::Narration);
        let narration = self
            .narrator
            .narrate(&content, &work_dir)
            .await
            .inspect_err(|e| observer.stage_failed(Stage::Narration, e))?;
        let content = if narration.duration_seconds > content.total_duration() {
            info!(
                narration = narration.duration_seconds,
                script = content.total_duration(),
                "stretching script to cover narration"
            );
            content.stretched_to(narration.duration_seconds)
        } else {
            content
        };
        observer.stage_finished(
            Stage::Narration,
            &format!("{:.1}s of narration", narration.duration_seconds),
        );
        check_cancelled(shutdown, Stage::Narration)?;

        observer.stage_started(Stage::Render);
        let audio = AudioTrack::new(narration.path, assets.music);
        let video = async {
            let spec = RenderSpec::plan(&content, &assets.background, self.config.format)?;
            self.renderer
                .render(&content, &assets.background, &audio, &spec, &work_dir)
                .await
        }
        .await
        .inspect_err(|e| observer.stage_failed(Stage::Render, e))?;
        observer.stage_finished(
            Stage::Render,
            &format!("{:.1}s, {} frames", video.duration_seconds, video.frames),
        );

        let mut report = RunReport {
            run_id,
            title: content.title().to_string(),
            topic: content.topic().to_string(),
            duration_seconds: video.duration_seconds,
            video_path: Some(video.path.clone()),
            video_id: None,
            metadata: None,
        };

        let Some(credential) = credential else {
            info!(path = %video.path.display(), "upload skipped");
            return Ok(report);
        };
        check_cancelled(shutdown, Stage::Render)?;

        observer.stage_started(Stage::Publish);
        let today = Local::now().date_naive();
        let mut metadata = UploadMetadata::from_templates(&self.config.metadata, &content, today);
        if let Some(privacy) = options.privacy {
            metadata.privacy_status = privacy;
        }
        let video_id = self
            .publisher
            .publish(&video.path, &metadata, &credential, &mut |p| {
                observer.upload_progress(p)
            })
            .await
            .inspect_err(|e| observer.stage_failed(Stage::Publish, e))?;
        observer.stage_finished(Stage::Publish, &video_id);
        info!(%run_id, %video_id, "run complete");

        if !options.keep_artifacts {
            if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
                warn!(work_dir = %work_dir.display(), "could not remove run directory: {e}");
            }
            report.video_path = None;
        }
        report.video_id = Some(video_id);
        report.metadata = Some(metadata);
        Ok(report)
    }
}

fn background_kind(is_video: bool) -> &'static str {
    if is_video { "video" } else { "still" }
}

fn check_cancelled(shutdown: &mut broadcast::Receiver<()>, after: Stage) -> Result<()> {
    match shutdown.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => {
            warn!(stage = %after, "run cancelled");
            Err(PipelineError::Cancelled { after: after.name() })
        }
        Err(TryRecvError::Empty | TryRecvError::Closed) => Ok(()),
    }
}
