//! Renderer: caption overlays, per-segment clips, concatenation and the
//! final audio mux, all driven through a [`VideoEncoder`].

pub mod caption;
pub mod encoder;
#[cfg(any(test, feature = "test-fakes"))]
pub mod fakes;
pub mod ffmpeg;
pub mod font;
pub mod layout;
pub mod plan;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    error::{PipelineError, RenderStage, Result},
    types::{AudioTrack, BackgroundAsset, ScriptContent},
};

pub use caption::CaptionStyle;
pub use encoder::{ClipJob, ConcatJob, EncoderError, MuxJob, VideoEncoder};
pub use ffmpeg::FfmpegEncoder;
pub use font::FontdueGlyphs;
pub use layout::GlyphSource;
pub use plan::{RenderSpec, SegmentPlan, SourceSlice};

const OUTPUT_FILE: &str = "short.mp4";
const SILENT_FILE: &str = "video-silent.mp4";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub frames: u64,
}

pub struct Renderer {
    encoder: Arc<dyn VideoEncoder>,
    glyphs: Arc<dyn GlyphSource>,
    style: CaptionStyle,
}

impl Renderer {
    pub fn new(
        encoder: Arc<dyn VideoEncoder>,
        glyphs: Arc<dyn GlyphSource>,
        style: CaptionStyle,
    ) -> Self {
        Self {
            encoder,
            glyphs,
            style,
        }
    }

    /// Render `spec` into `work_dir`. Nothing is left claiming to be the
    /// final video unless every sub-step succeeded.
    pub async fn render(
        &self,
        content: &ScriptContent,
        background: &BackgroundAsset,
        audio: &AudioTrack,
        spec: &RenderSpec,
        work_dir: &Path,
    ) -> Result<RenderedVideo> {
        let target = spec.format.dimensions();
        if background.needs_upscale(target) {
            debug!(source = %background.dimensions(), %target, "background will be upscaled");
        }
        info!(
            segments = spec.segments.len(),
            frames = spec.total_frames,
            duration = spec.total_duration,
            "rendering"
        );

        let mut intermediates = Vec::new();
        let mut clips = Vec::with_capacity(spec.segments.len());

        for segment in &spec.segments {
            let overlay = work_dir.join(format!("overlay-{}.png", segment.index));
            self.write_overlay(&segment.text, content.topic(), spec, &overlay)
                .await?;
            intermediates.push(overlay.clone());

            let job = ClipJob {
                source: segment.source.clone(),
                overlay,
                format: spec.format,
                frames: segment.frames,
                output: work_dir.join(format!("clip-{}.mp4", segment.index)),
            };
            self.encoder.encode_clip(&job).await.map_err(|e| {
                PipelineError::render(
                    RenderStage::ClipEncoding,
                    format!("segment {}: {e}", segment.index),
                )
            })?;
            debug!(segment = segment.index, frames = segment.frames, "clip encoded");
            intermediates.push(job.output.clone());
            clips.push(job.output);
        }

        let silent = work_dir.join(SILENT_FILE);
        self.encoder
            .concat(&ConcatJob {
                clips,
                output: silent.clone(),
            })
            .await
            .map_err(|e| PipelineError::render(RenderStage::Concatenation, e))?;
        intermediates.push(silent.clone());

        let output = work_dir.join(OUTPUT_FILE);
        let mux = MuxJob {
            video: silent,
            narration: audio.narration_path.clone(),
            narration_volume: audio.narration_volume,
            music: audio.music_path.clone(),
            music_volume: audio.music_volume,
            duration: spec.total_duration,
            output: output.clone(),
        };
        if let Err(e) = self.encoder.mux_audio(&mux).await {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(PipelineError::render(RenderStage::AudioMux, e));
        }

        self.check_duration(&output, spec).await;
        remove_all(&intermediates).await;

        info!(path = %output.display(), "render complete");
        Ok(RenderedVideo {
            path: output,
            duration_seconds: spec.total_duration,
            frames: spec.total_frames,
        })
    }

    async fn write_overlay(
        &self,
        text: &str,
        label: &str,
        spec: &RenderSpec,
        path: &Path,
    ) -> Result<()> {
        let glyphs = Arc::clone(&self.glyphs);
        let style = self.style.clone();
        let (text, label) = (text.to_string(), label.to_string());
        let canvas = spec.format.dimensions();
        let path_owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let image = caption::render_overlay(glyphs.as_ref(), &style, &text, &label, canvas)
                .map_err(|e| e.to_string())?;
            image.save(&path_owned).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| PipelineError::render(RenderStage::FrameGeneration, e))?
        .map_err(|e| {
            PipelineError::render(
                RenderStage::FrameGeneration,
                format!("{}: {e}", path.display()),
            )
        })
    }

    async fn check_duration(&self, output: &Path, spec: &RenderSpec) {
        match self.encoder.probe_duration(output).await {
            Ok(actual) => {
                let drift = (actual - spec.total_duration).abs();
                if drift > spec.format.frame_interval() {
                    warn!(actual, expected = spec.total_duration, "rendered duration drifted");
                }
            }
            Err(e) => warn!("could not probe rendered video: {e}"),
        }
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), "leaving intermediate file: {e}");
        }
    }
}
