use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;

use crate::{render::plan::SourceSlice, types::VideoFormat};

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("could not read {what}: {reason}")]
    Output { what: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One segment clip: background slice with a caption overlay on top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipJob {
    pub source: SourceSlice,
    pub overlay: PathBuf,
    pub format: VideoFormat,
    pub frames: u64,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcatJob {
    pub clips: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Put the final audio under a silent video, cut to `duration` seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxJob {
    pub video: PathBuf,
    pub narration: PathBuf,
    pub narration_volume: f32,
    pub music: Option<PathBuf>,
    pub music_volume: f32,
    pub duration: f64,
    pub output: PathBuf,
}

/// The external video tool. Each call either produces its output file or
/// fails; nothing else is shared between calls.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    async fn encode_clip(&self, job: &ClipJob) -> Result<(), EncoderError>;

    async fn concat(&self, job: &ConcatJob) -> Result<(), EncoderError>;

    async fn mux_audio(&self, job: &MuxJob) -> Result<(), EncoderError>;

    /// Container duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, EncoderError>;
}
