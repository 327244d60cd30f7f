//! In-memory stand-ins for the renderer's collaborators.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::render::{
    encoder::{ClipJob, ConcatJob, EncoderError, MuxJob, VideoEncoder},
    layout::{GlyphMetrics, GlyphSource, LineMetrics},
};

/// Monospace glyphs drawn as solid boxes: every character advances
/// `0.6 * px`, whitespace has no ink.
pub struct BlockGlyphs;

impl GlyphSource for BlockGlyphs {
    fn metrics(&self, ch: char, px: f32) -> GlyphMetrics {
        let advance = 0.6 * px;
        let (width, height) = if ch.is_whitespace() {
            (0, 0)
        } else {
            (advance.ceil() as usize, (0.7 * px).ceil() as usize)
        };
        GlyphMetrics {
            advance,
            xmin: 0,
            ymin: 0,
            width,
            height,
        }
    }

    fn rasterize(&self, ch: char, px: f32) -> (GlyphMetrics, Vec<u8>) {
        let metrics = self.metrics(ch, px);
        (metrics, vec![255; metrics.width * metrics.height])
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        LineMetrics {
            ascent: 0.8 * px,
            line_height: 1.2 * px,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncoderOp {
    Clip(ClipJob),
    Concat(ConcatJob),
    Mux(MuxJob),
    Probe(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Clip(usize),
    Concat,
    Mux,
}

/// Records every requested operation and writes a few placeholder bytes to
/// each output file instead of producing media. `probe_duration` answers
/// with the duration of the last mux.
#[derive(Default)]
pub struct RecordingEncoder {
    ops: Mutex<Vec<EncoderOp>>,
    fail_on: Option<FailOn>,
}

impl RecordingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fail_on: FailOn) -> Self {
        Self {
            ops: Mutex::default(),
            fail_on: Some(fail_on),
        }
    }

    pub fn ops(&self) -> Vec<EncoderOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    fn record(&self, op: EncoderOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }

    fn clip_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, EncoderOp::Clip(_)))
            .count()
    }

    fn refuse(what: &str) -> EncoderError {
        EncoderError::Failed {
            program: "recording".into(),
            status: "exit status: 1".into(),
            stderr: format!("{what} refused"),
        }
    }
}

async fn touch(path: &Path) -> Result<(), EncoderError> {
    tokio::fs::write(path, b"recorded").await?;
    Ok(())
}

#[async_trait]
impl VideoEncoder for RecordingEncoder {
    async fn encode_clip(&self, job: &ClipJob) -> Result<(), EncoderError> {
        let index = self.clip_count();
        self.record(EncoderOp::Clip(job.clone()));
        if self.fail_on == Some(FailOn::Clip(index)) {
            return Err(Self::refuse("clip"));
        }
        touch(&job.output).await
    }

    async fn concat(&self, job: &ConcatJob) -> Result<(), EncoderError> {
        self.record(EncoderOp::Concat(job.clone()));
        if self.fail_on == Some(FailOn::Concat) {
            return Err(Self::refuse("concat"));
        }
        touch(&job.output).await
    }

    async fn mux_audio(&self, job: &MuxJob) -> Result<(), EncoderError> {
        self.record(EncoderOp::Mux(job.clone()));
        if self.fail_on == Some(FailOn::Mux) {
            return Err(Self::refuse("mux"));
        }
        touch(&job.output).await
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, EncoderError> {
        self.record(EncoderOp::Probe(path.to_path_buf()));
        self.ops()
            .iter()
            .rev()
            .find_map(|op| match op {
                EncoderOp::Mux(job) if job.output == path => Some(job.duration),
                _ => None,
            })
            .ok_or_else(|| EncoderError::Output {
                what: path.display().to_string(),
                reason: "never produced".into(),
            })
    }
}
