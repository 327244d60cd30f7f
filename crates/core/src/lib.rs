pub mod assets;
pub mod config;
pub mod content;
pub mod error;
pub mod format;
pub mod narration;
pub mod pipeline;
pub mod provider;
pub mod publish;
pub mod render;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError, RenderStage, Result, UploadFailureKind};
pub use pipeline::{NoopObserver, Pipeline, PipelineObserver, RunOptions, RunReport, Stage};
pub use provider::TextSourceKind;
pub use publish::UploadProgress;
pub use types::{
    AudioTrack, BackgroundAsset, Credential, Dimensions, PrivacyStatus, ScriptContent, Segment,
    UploadMetadata, VideoFormat,
};
