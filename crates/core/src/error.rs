use std::fmt;

use thiserror::Error;

/// Sub-step of the renderer that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    FrameGeneration,
    ClipEncoding,
    Concatenation,
    AudioMux,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::FrameGeneration => "frame generation",
            RenderStage::ClipEncoding => "clip encoding",
            RenderStage::Concatenation => "concatenation",
            RenderStage::AudioMux => "audio mux",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailureKind {
    /// Network interruption or server hiccup, retried with backoff.
    Transient,
    /// Quota exceeded, invalid metadata and friends. Never retried.
    Permanent,
}

impl fmt::Display for UploadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadFailureKind::Transient => f.write_str("transient"),
            UploadFailureKind::Permanent => f.write_str("permanent"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing upload credential: {env_var} environment variable is not set")]
    MissingCredential { env_var: &'static str },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Content unavailable: {reason}")]
    ContentUnavailable { reason: String },

    #[error("Asset unavailable: {reason}")]
    AssetUnavailable { reason: String },

    #[error("Render failed during {stage}: {reason}")]
    RenderFailure { stage: RenderStage, reason: String },

    #[error("Authentication failed: {reason}")]
    AuthFailure { reason: String },

    #[error("Upload failed ({kind}): {reason}")]
    UploadFailure {
        kind: UploadFailureKind,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run cancelled after the {after} stage")]
    Cancelled { after: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn render(stage: RenderStage, reason: impl fmt::Display) -> Self {
        PipelineError::RenderFailure {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn upload(kind: UploadFailureKind, reason: impl fmt::Display) -> Self {
        PipelineError::UploadFailure {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Name of the pipeline stage the error belongs to, for reporting.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ContentUnavailable { .. } => "content",
            PipelineError::AssetUnavailable { .. } => "assets",
            PipelineError::RenderFailure { .. } => "render",
            PipelineError::AuthFailure { .. } | PipelineError::UploadFailure { .. } => "publish",
            PipelineError::Config(_) => "config",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failure_names_sub_step() {
        let err = PipelineError::render(RenderStage::AudioMux, "ffmpeg exited with 1");
        assert_eq!(
            err.to_string(),
            "Render failed during audio mux: ffmpeg exited with 1"
        );
        assert_eq!(err.stage(), "render");
    }

    #[test]
    fn upload_failure_carries_kind() {
        let err = PipelineError::upload(UploadFailureKind::Permanent, "quotaExceeded");
        assert!(matches!(
            err,
            PipelineError::UploadFailure {
                kind: UploadFailureKind::Permanent,
                ..
            }
        ));
        assert_eq!(err.stage(), "publish");
    }
}
