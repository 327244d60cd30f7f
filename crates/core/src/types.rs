use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Background music is mixed this far below the narration.
pub const MUSIC_ATTENUATION: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
}

impl Segment {
    pub fn new(text: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            text: text.into(),
            duration_seconds,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScriptError {
    #[error("script has no segments")]
    NoSegments,

    #[error("segment {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },
}

/// Narration text and its timed segments. Immutable once built; the
/// segment durations add up to the length of the final video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptContent {
    title: String,
    topic: String,
    narration_text: String,
    segments: Vec<Segment>,
}

impl ScriptContent {
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        narration_text: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Result<Self, ScriptError> {
        if segments.is_empty() {
            return Err(ScriptError::NoSegments);
        }
        for (index, segment) in segments.iter().enumerate() {
            let duration = segment.duration_seconds;
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ScriptError::InvalidDuration { index, duration });
            }
        }

        Ok(Self {
            title: title.into(),
            topic: topic.into(),
            narration_text: narration_text.into(),
            segments,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn narration_text(&self) -> &str {
        &self.narration_text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }

    /// Scale every segment so the script lasts `total_seconds`, keeping the
    /// relative proportions.
    pub fn stretched_to(&self, total_seconds: f64) -> Self {
        let current = self.total_duration();
        if !total_seconds.is_finite() || total_seconds <= 0.0 || current <= 0.0 {
            return self.clone();
        }
        let factor = total_seconds / current;

        Self {
            segments: self
                .segments
                .iter()
                .map(|s| Segment::new(s.text.clone(), s.duration_seconds * factor))
                .collect(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when both sides are at least as large as `target`.
    pub fn covers(&self, target: Dimensions) -> bool {
        self.width >= target.width && self.height >= target.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BackgroundAsset {
    Image {
        path: PathBuf,
        dimensions: Dimensions,
    },
    Video {
        path: PathBuf,
        dimensions: Dimensions,
        source_duration: f64,
    },
}

impl BackgroundAsset {
    pub fn path(&self) -> &Path {
        match self {
            BackgroundAsset::Image { path, .. } | BackgroundAsset::Video { path, .. } => path,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match self {
            BackgroundAsset::Image { dimensions, .. }
            | BackgroundAsset::Video { dimensions, .. } => *dimensions,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, BackgroundAsset::Video { .. })
    }

    /// Whether the renderer has to scale up before cropping to `target`.
    pub fn needs_upscale(&self, target: Dimensions) -> bool {
        !self.dimensions().covers(target)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("volume {0} is outside [0, 1]")]
pub struct VolumeError(pub f32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    pub narration_path: PathBuf,
    pub music_path: Option<PathBuf>,
    pub narration_volume: f32,
    pub music_volume: f32,
}

impl AudioTrack {
    pub fn new(narration_path: PathBuf, music_path: Option<PathBuf>) -> Self {
        Self {
            narration_path,
            music_path,
            narration_volume: 1.0,
            music_volume: MUSIC_ATTENUATION,
        }
    }

    pub fn with_volumes(mut self, narration: f32, music: f32) -> Result<Self, VolumeError> {
        for volume in [narration, music] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(VolumeError(volume));
            }
        }
        self.narration_volume = narration;
        self.music_volume = music;
        Ok(self)
    }

    pub fn has_music(&self) -> bool {
        self.music_path.is_some()
    }
}

/// Target output format of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoFormat {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps as f64
    }
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    #[default]
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "private" => Ok(PrivacyStatus::Private),
            other => Err(format!(
                "expected public, unlisted or private, got {other:?}"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub made_for_kids: bool,
}

/// Long-lived OAuth refresh credential. Owned by the environment, never
/// written anywhere by this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(durations: &[f64]) -> Vec<Segment> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| Segment::new(format!("line {i}"), *d))
            .collect()
    }

    #[test]
    fn script_requires_segments() {
        let err = ScriptContent::new("t", "topic", "", Vec::new()).unwrap_err();
        assert_eq!(err, ScriptError::NoSegments);
    }

    #[test]
    fn script_rejects_non_positive_durations() {
        let err = ScriptContent::new("t", "topic", "", segments(&[6.0, 0.0])).unwrap_err();
        assert_eq!(
            err,
            ScriptError::InvalidDuration {
                index: 1,
                duration: 0.0
            }
        );
        assert!(ScriptContent::new("t", "topic", "", segments(&[f64::NAN])).is_err());
    }

    #[test]
    fn stretching_keeps_proportions() {
        let script = ScriptContent::new("t", "topic", "", segments(&[2.0, 6.0])).unwrap();
        let stretched = script.stretched_to(16.0);
        assert_eq!(stretched.segments()[0].duration_seconds, 4.0);
        assert_eq!(stretched.segments()[1].duration_seconds, 12.0);
        assert_eq!(stretched.total_duration(), 16.0);
        assert_eq!(stretched.title(), "t");
    }

    #[test]
    fn audio_volumes_are_bounded() {
        let track = AudioTrack::new(PathBuf::from("n.wav"), None);
        assert_eq!(track.music_volume, MUSIC_ATTENUATION);
        assert!(!track.has_music());
        assert_eq!(
            track.clone().with_volumes(1.2, 0.2).unwrap_err(),
            VolumeError(1.2)
        );
        assert!(track.with_volumes(1.0, 0.0).is_ok());
    }

    #[test]
    fn privacy_parses_case_insensitively() {
        assert_eq!("Public".parse::<PrivacyStatus>(), Ok(PrivacyStatus::Public));
        assert_eq!(
            " unlisted ".parse::<PrivacyStatus>(),
            Ok(PrivacyStatus::Unlisted)
        );
        assert!("secret".parse::<PrivacyStatus>().is_err());
        assert_eq!(PrivacyStatus::default(), PrivacyStatus::Private);
    }

    #[test]
    fn credential_debug_hides_secrets() {
        let credential = Credential {
            client_id: "id".into(),
            client_secret: "shh".into(),
            refresh_token: "rt".into(),
        };
        let printed = format!("{credential:?}");
        assert!(printed.contains("id"));
        assert!(!printed.contains("shh"));
        assert!(!printed.contains("rt\""));
    }

    #[test]
    fn background_reports_upscale_need() {
        let asset = BackgroundAsset::Video {
            path: PathBuf::from("bg.mp4"),
            dimensions: Dimensions::new(720, 1280),
            source_duration: 12.0,
        };
        assert!(asset.is_video());
        assert!(asset.needs_upscale(Dimensions::new(1080, 1920)));
        assert!(!asset.needs_upscale(Dimensions::new(720, 1280)));
    }
}
