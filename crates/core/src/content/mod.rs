//! Content provider: narration text and title for a run.
//!
//! A remote source is tried first under a bounded timeout. Any failure
//! (network, status, timeout, malformed payload) falls back to the local
//! template library, which cannot fail for a valid timing.

pub mod remote;
pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom};
use tracing::{info, warn};

use crate::{
    config::{PipelineConfig, ScriptTiming},
    error::PipelineError,
    provider::TextSourceKind,
    types::ScriptContent,
};

pub use remote::{HuggingFaceSource, QuoteSource};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

impl SourceError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        SourceError::Malformed {
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait TextSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        topic: &str,
        timing: &ScriptTiming,
    ) -> Result<ScriptContent, SourceError>;
}

/// Split `text` into at most `count` chunks of roughly equal word count.
/// Fewer chunks come back when there are fewer words than `count`.
pub fn split_text(text: &str, count: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let count = count.clamp(1, words.len());
    let base = words.len() / count;
    let extra = words.len() % count;

    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = base + usize::from(i < extra);
        chunks.push(words[start..start + len].join(" "));
        start += len;
    }
    chunks
}

pub struct ContentProvider {
    source: Option<Box<dyn TextSource>>,
    timing: ScriptTiming,
    timeout: Duration,
    rng: StdRng,
    /// Drawn once, so unhinted runs of one provider agree on the topic.
    default_topic: Option<String>,
}

impl ContentProvider {
    pub fn new(
        source: Option<Box<dyn TextSource>>,
        timing: ScriptTiming,
        timeout: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            source,
            timing,
            timeout,
            rng,
            default_topic: None,
        }
    }

    /// Build the remote source described by `config`. A source that cannot
    /// even be constructed is logged and skipped.
    pub fn from_config(config: &PipelineConfig, rng: StdRng) -> Self {
        let settings = &config.text_source;
        let source: Option<Box<dyn TextSource>> = match settings.kind {
            TextSourceKind::Local => None,
            TextSourceKind::Quotes => QuoteSource::new(&settings.api_url, config.http_timeout)
                .map(|s| Box::new(s) as Box<dyn TextSource>)
                .map_err(|e| warn!("quote source unavailable: {e}"))
                .ok(),
            TextSourceKind::HuggingFace => settings.api_key.as_ref().and_then(|key| {
                HuggingFaceSource::new(&settings.api_url, key, config.http_timeout)
                    .map(|s| Box::new(s) as Box<dyn TextSource>)
                    .map_err(|e| warn!("huggingface source unavailable: {e}"))
                    .ok()
            }),
        };

        Self::new(source, config.timing, config.http_timeout, rng)
    }

    pub async fn produce(
        &mut self,
        topic_hint: Option<&str>,
    ) -> crate::error::Result<ScriptContent> {
        let topic = match topic_hint.map(str::trim).filter(|t| !t.is_empty()) {
            Some(topic) => topic.to_string(),
            None => self.default_topic(),
        };
        info!(%topic, "producing script");

        if let Some(source) = &self.source {
            let fetched = tokio::time::timeout(self.timeout, source.fetch(&topic, &self.timing))
                .await
                .unwrap_or(Err(SourceError::Timeout(self.timeout)));
            match fetched {
                Ok(script) => {
                    info!(source = source.name(), title = script.title(), "remote script");
                    return Ok(script);
                }
                Err(e) => {
                    warn!(source = source.name(), "remote text failed, using templates: {e}")
                }
            }
        }

        templates::script_for(&topic, &self.timing).map_err(|e| {
            PipelineError::ContentUnavailable {
                reason: format!("template for {topic:?} is invalid: {e}"),
            }
        })
    }

    fn default_topic(&mut self) -> String {
        let rng = &mut self.rng;
        self.default_topic
            .get_or_insert_with(|| {
                templates::TOPICS
                    .choose(rng)
                    .copied()
                    .unwrap_or(templates::TOPICS[0])
                    .to_string()
            })
            .clone()
    }
}
