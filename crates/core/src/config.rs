use std::{ops::RangeInclusive, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    error::ConfigError,
    provider::TextSourceKind,
    types::{Credential, PrivacyStatus, VideoFormat},
};

/// YouTube wants resumable chunks in multiples of 256 KiB.
pub const UPLOAD_CHUNK_QUANTUM: u64 = 256 * 1024;

/// Allowed number of segments in a script.
pub const SEGMENT_RANGE: RangeInclusive<usize> = 3..=5;

/// Script length and segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptTiming {
    pub target_seconds: f64,
    pub segment_count: usize,
    pub min_segment_seconds: f64,
}

impl ScriptTiming {
    /// Each segment lasts `max(min_segment_seconds, target_seconds / count)`.
    pub fn segment_duration(&self, count: usize) -> f64 {
        let count = count.max(1) as f64;
        (self.target_seconds / count).max(self.min_segment_seconds)
    }
}

impl Default for ScriptTiming {
    fn default() -> Self {
        Self {
            target_seconds: 40.0,
            segment_count: 4,
            min_segment_seconds: 6.0,
        }
    }
}

/// Templates and fixed fields used to build the upload metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTemplates {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub made_for_kids: bool,
}

impl Default for MetadataTemplates {
    fn default() -> Self {
        Self {
            title: "Quick Tech Tip — {date}".to_string(),
            description: "Auto-generated Short. Topic: {topic}\n#shorts".to_string(),
            tags: split_tags("shorts,tech,info"),
            category_id: "28".to_string(),
            privacy_status: PrivacyStatus::Private,
            made_for_kids: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSourceSettings {
    pub kind: TextSourceKind,
    pub api_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockSettings {
    pub pixabay_key: Option<String>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub chunk_bytes: u64,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

/// Everything a run needs, read once at process start and handed to each
/// stage explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credential: Option<Credential>,
    pub metadata: MetadataTemplates,
    pub text_source: TextSourceSettings,
    pub stock: StockSettings,
    pub music_path: PathBuf,
    pub font_path: Option<PathBuf>,
    pub piper_model: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub format: VideoFormat,
    pub timing: ScriptTiming,
    pub http_timeout: Duration,
    pub upload: UploadSettings,
}

impl PipelineConfig {
    /// Load configuration from the process environment.
    ///
    /// With `upload_enabled`, missing OAuth credentials are an error here,
    /// before anything gets rendered.
    pub fn from_env(upload_enabled: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), upload_enabled)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        upload_enabled: bool,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credential = match (
            get("YT_CLIENT_ID"),
            get("YT_CLIENT_SECRET"),
            get("YT_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(Credential {
                client_id,
                client_secret,
                refresh_token,
            }),
            (client_id, client_secret, _) if upload_enabled => {
                let env_var = if client_id.is_none() {
                    "YT_CLIENT_ID"
                } else if client_secret.is_none() {
                    "YT_CLIENT_SECRET"
                } else {
                    "YT_REFRESH_TOKEN"
                };
                return Err(ConfigError::MissingCredential { env_var });
            }
            _ => None,
        };

        let defaults = MetadataTemplates::default();
        let metadata = MetadataTemplates {
            title: get("YT_TITLE").unwrap_or(defaults.title),
            description: get("YT_DESC").unwrap_or(defaults.description),
            tags: get("YT_TAGS")
                .map(|tags| split_tags(&tags))
                .unwrap_or(defaults.tags),
            category_id: get("YT_CATEGORY_ID").unwrap_or(defaults.category_id),
            privacy_status: parse_or("YT_PRIVACY", get("YT_PRIVACY"), defaults.privacy_status)?,
            made_for_kids: parse_bool(
                "YT_MADE_FOR_KIDS",
                get("YT_MADE_FOR_KIDS"),
                defaults.made_for_kids,
            )?,
        };

        let hf_token = get("HF_TOKEN");
        let default_kind = if hf_token.is_some() {
            TextSourceKind::HuggingFace
        } else {
            TextSourceKind::Quotes
        };
        let kind = parse_or("TEXT_SOURCE", get("TEXT_SOURCE"), default_kind)?;
        let api_key = kind
            .api_key(&get)
            .map_err(|e| ConfigError::Invalid {
                key: "TEXT_SOURCE",
                reason: e.to_string(),
            })?;
        let api_url = match kind {
            TextSourceKind::Quotes => get("QUOTES_API_URL"),
            _ => None,
        }
        .unwrap_or_else(|| kind.config().api_url.to_string());

        let format = VideoFormat {
            width: parse_or("VIDEO_WIDTH", get("VIDEO_WIDTH"), 1080)?,
            height: parse_or("VIDEO_HEIGHT", get("VIDEO_HEIGHT"), 1920)?,
            fps: parse_or("VIDEO_FPS", get("VIDEO_FPS"), 24)?,
        };
        validate_format(&format)?;

        let timing = ScriptTiming {
            target_seconds: parse_or("TARGET_SECONDS", get("TARGET_SECONDS"), 40.0)?,
            segment_count: parse_or("SEGMENT_COUNT", get("SEGMENT_COUNT"), 4)?,
            min_segment_seconds: parse_or(
                "MIN_SEGMENT_SECONDS",
                get("MIN_SEGMENT_SECONDS"),
                6.0,
            )?,
        };
        validate_timing(&timing)?;

        let upload = UploadSettings {
            chunk_bytes: parse_or(
                "UPLOAD_CHUNK_BYTES",
                get("UPLOAD_CHUNK_BYTES"),
                32 * UPLOAD_CHUNK_QUANTUM,
            )?,
            max_retries: parse_or("UPLOAD_MAX_RETRIES", get("UPLOAD_MAX_RETRIES"), 5)?,
            backoff_base: Duration::from_millis(500),
        };
        if upload.chunk_bytes == 0 || upload.chunk_bytes % UPLOAD_CHUNK_QUANTUM != 0 {
            return Err(ConfigError::Invalid {
                key: "UPLOAD_CHUNK_BYTES",
                reason: format!("must be a positive multiple of {UPLOAD_CHUNK_QUANTUM}"),
            });
        }

        let http_timeout_secs: u64 = parse_or("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), 30)?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            credential,
            metadata,
            text_source: TextSourceSettings {
                kind,
                api_url,
                api_key,
            },
            stock: StockSettings {
                pixabay_key: get("PIXABAY_KEY"),
                query: get("STOCK_QUERY").unwrap_or_else(|| "technology".to_string()),
            },
            music_path: get("MUSIC_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/music.mp3")),
            font_path: get("FONT_PATH").map(PathBuf::from),
            piper_model: get("PIPER_MODEL").map(PathBuf::from),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            format,
            timing,
            http_timeout: Duration::from_secs(http_timeout_secs),
            upload,
        })
    }

    /// The credential, or the error the run should fail with before
    /// rendering anything.
    pub fn validate_for_upload(&self) -> Result<&Credential, ConfigError> {
        self.credential
            .as_ref()
            .ok_or(ConfigError::MissingCredential {
                env_var: "YT_CLIENT_ID",
            })
    }
}

pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {v:?}"),
        }),
    }
}

fn validate_format(format: &VideoFormat) -> Result<(), ConfigError> {
    // yuv420p needs even dimensions
    for (key, value) in [("VIDEO_WIDTH", format.width), ("VIDEO_HEIGHT", format.height)] {
        if value == 0 || value % 2 != 0 {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("must be a positive even number, got {value}"),
            });
        }
    }
    if !(24..=30).contains(&format.fps) {
        return Err(ConfigError::Invalid {
            key: "VIDEO_FPS",
            reason: format!("must be between 24 and 30, got {}", format.fps),
        });
    }
    Ok(())
}

fn validate_timing(timing: &ScriptTiming) -> Result<(), ConfigError> {
    if !SEGMENT_RANGE.contains(&timing.segment_count) {
        return Err(ConfigError::Invalid {
            key: "SEGMENT_COUNT",
            reason: format!("must be between 3 and 5, got {}", timing.segment_count),
        });
    }
    if !timing.target_seconds.is_finite() || timing.target_seconds <= 0.0 {
        return Err(ConfigError::Invalid {
            key: "TARGET_SECONDS",
            reason: "must be a positive number".into(),
        });
    }
    if !timing.min_segment_seconds.is_finite() || timing.min_segment_seconds <= 0.0 {
        return Err(ConfigError::Invalid {
            key: "MIN_SEGMENT_SECONDS",
            reason: "must be a positive number".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 3] = [
        ("YT_CLIENT_ID", "client"),
        ("YT_CLIENT_SECRET", "secret"),
        ("YT_REFRESH_TOKEN", "refresh"),
    ];

    #[test]
    fn defaults_without_upload() {
        let config = PipelineConfig::from_lookup(lookup(&[]), false).unwrap();
        assert!(config.credential.is_none());
        assert_eq!(config.format, VideoFormat::default());
        assert_eq!(config.timing, ScriptTiming::default());
        assert_eq!(config.text_source.kind, TextSourceKind::Quotes);
        assert_eq!(config.metadata.privacy_status, PrivacyStatus::Private);
        assert_eq!(config.metadata.tags, vec!["shorts", "tech", "info"]);
        assert_eq!(config.upload.chunk_bytes, 8 * 1024 * 1024);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.validate_for_upload().is_err());
    }

    #[test]
    fn missing_credential_fails_fast_when_uploading() {
        let err = PipelineConfig::from_lookup(
            lookup(&[("YT_CLIENT_ID", "client"), ("YT_CLIENT_SECRET", "secret")]),
            true,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                env_var: "YT_REFRESH_TOKEN"
            }
        );

        let err = PipelineConfig::from_lookup(lookup(&[("YT_CLIENT_ID", " ")]), true).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                env_var: "YT_CLIENT_ID"
            }
        );
    }

    #[test]
    fn credential_loaded_when_complete() {
        let config = PipelineConfig::from_lookup(lookup(&CREDS), true).unwrap();
        let credential = config.validate_for_upload().unwrap();
        assert_eq!(credential.client_id, "client");
        assert_eq!(credential.refresh_token, "refresh");
    }

    #[test]
    fn hf_token_switches_default_source() {
        let config = PipelineConfig::from_lookup(lookup(&[("HF_TOKEN", "hf_x")]), false).unwrap();
        assert_eq!(config.text_source.kind, TextSourceKind::HuggingFace);
        assert_eq!(config.text_source.api_key.as_deref(), Some("hf_x"));

        let err =
            PipelineConfig::from_lookup(lookup(&[("TEXT_SOURCE", "huggingface")]), false)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TEXT_SOURCE", .. }));
    }

    #[test]
    fn templates_and_tags_from_env() {
        let config = PipelineConfig::from_lookup(
            lookup(&[
                ("YT_TITLE", "{title} | {date}"),
                ("YT_TAGS", " shorts, ,tips,shorts "),
                ("YT_PRIVACY", "unlisted"),
                ("YT_MADE_FOR_KIDS", "yes"),
            ]),
            false,
        )
        .unwrap();
        assert_eq!(config.metadata.title, "{title} | {date}");
        assert_eq!(config.metadata.tags, vec!["shorts", "tips"]);
        assert_eq!(config.metadata.privacy_status, PrivacyStatus::Unlisted);
        assert!(config.metadata.made_for_kids);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err =
            PipelineConfig::from_lookup(lookup(&[("VIDEO_WIDTH", "721")]), false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "VIDEO_WIDTH", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("VIDEO_FPS", "60")]), false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "VIDEO_FPS", .. }));

        let err =
            PipelineConfig::from_lookup(lookup(&[("SEGMENT_COUNT", "9")]), false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SEGMENT_COUNT", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("UPLOAD_CHUNK_BYTES", "1000")]), false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "UPLOAD_CHUNK_BYTES", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("YT_PRIVACY", "friends")]), false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "YT_PRIVACY", .. }));
    }

    #[test]
    fn segment_duration_has_a_floor() {
        let timing = ScriptTiming::default();
        assert_eq!(timing.segment_duration(4), 10.0);
        let short = ScriptTiming {
            target_seconds: 12.0,
            ..timing
        };
        assert_eq!(short.segment_duration(4), 6.0);
    }
}
