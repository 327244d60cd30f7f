use std::path::PathBuf;

use serde::Serialize;

use crate::{
    error::{PipelineError, RenderStage, Result},
    types::{BackgroundAsset, ScriptContent, VideoFormat},
};

/// Which part of the background a segment shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SourceSlice {
    /// A still image held for the whole segment.
    Still { path: PathBuf },
    /// A video read from `offset` seconds, looping if it runs out.
    Video { path: PathBuf, offset: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPlan {
    pub index: usize,
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub frames: u64,
    pub source: SourceSlice,
}

/// Frame-exact plan for one render.
///
/// Segment boundaries are snapped to the frame grid from the cumulative
/// script time, so the frame counts always add up to `round(total * fps)`
/// and the rendered length stays within one frame of the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSpec {
    pub format: VideoFormat,
    pub total_duration: f64,
    pub total_frames: u64,
    pub segments: Vec<SegmentPlan>,
}

impl RenderSpec {
    pub fn plan(
        content: &ScriptContent,
        background: &BackgroundAsset,
        format: VideoFormat,
    ) -> Result<Self> {
        if format.fps == 0 || format.width == 0 || format.height == 0 {
            return Err(PipelineError::render(
                RenderStage::FrameGeneration,
                format!("unusable output format {}x{}@{}", format.width, format.height, format.fps),
            ));
        }
        let fps = format.fps as f64;

        let mut segments = Vec::with_capacity(content.segments().len());
        let mut elapsed = 0.0;
        let mut boundary = 0u64;

        for (index, segment) in content.segments().iter().enumerate() {
            let start = elapsed;
            elapsed += segment.duration_seconds;
            let next_boundary = (elapsed * fps).round() as u64;
            let frames = next_boundary.saturating_sub(boundary);
            let start_frame = boundary;
            boundary = next_boundary;

            if frames == 0 {
                continue;
            }

            segments.push(SegmentPlan {
                index,
                text: segment.text.clone(),
                start: start_frame as f64 / fps,
                duration: frames as f64 / fps,
                frames,
                source: slice_at(background, start),
            });
        }

        let total_frames = boundary;
        if total_frames == 0 || segments.is_empty() {
            return Err(PipelineError::render(
                RenderStage::FrameGeneration,
                format!("script of {elapsed:.3}s is shorter than one frame at {} fps", format.fps),
            ));
        }

        Ok(Self {
            format,
            total_duration: total_frames as f64 / fps,
            total_frames,
            segments,
        })
    }
}

fn slice_at(background: &BackgroundAsset, start: f64) -> SourceSlice {
    match background {
        BackgroundAsset::Image { path, .. } => SourceSlice::Still { path: path.clone() },
        BackgroundAsset::Video {
            path,
            source_duration,
            ..
        } => {
            let offset = if *source_duration > 0.0 {
                start % source_duration
            } else {
                0.0
            };
            SourceSlice::Video {
                path: path.clone(),
                offset,
            }
        }
    }
}
