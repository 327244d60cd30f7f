use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::{SEGMENT_RANGE, ScriptTiming},
    content::{SourceError, TextSource, split_text},
    format::title_case,
    types::{ScriptContent, Segment},
};

/// Random-quote API returning `[{"q": "...", "a": "..."}]` or a single
/// object with `quote`/`content`/`text` and `author`.
pub struct QuoteSource {
    client: reqwest::Client,
    api_url: String,
}

impl QuoteSource {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl TextSource for QuoteSource {
    fn name(&self) -> &'static str {
        "quotes"
    }

    async fn fetch(
        &self,
        topic: &str,
        timing: &ScriptTiming,
    ) -> Result<ScriptContent, SourceError> {
        let response = self.client.get(&self.api_url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let body = response.json::<serde_json::Value>().await?;
        debug!(?body, "quote source response");

        parse_quote(&body, topic, timing)
    }
}

pub fn parse_quote(
    body: &serde_json::Value,
    topic: &str,
    timing: &ScriptTiming,
) -> Result<ScriptContent, SourceError> {
    let item = match body {
        serde_json::Value::Array(items) => items.first(),
        serde_json::Value::Object(_) => Some(body),
        _ => None,
    }
    .ok_or_else(|| SourceError::malformed("expected a quote object"))?;

    let text = ["q", "quote", "content", "text"]
        .iter()
        .find_map(|key| item[*key].as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::malformed("quote text missing"))?;
    let author = ["a", "author"]
        .iter()
        .find_map(|key| item[*key].as_str())
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let narration = match author {
        Some(author) => format!("{text} — {author}"),
        None => text.to_string(),
    };
    let title = match author {
        Some(author) => format!("Words from {author}"),
        None => "Quote of the Day".to_string(),
    };

    let parts = split_text(&narration, timing.segment_count);
    if !SEGMENT_RANGE.contains(&parts.len()) {
        return Err(SourceError::malformed(format!(
            "quote too short for {} segments",
            SEGMENT_RANGE.start()
        )));
    }
    let duration = timing.segment_duration(parts.len());
    let segments = parts
        .into_iter()
        .map(|part| Segment::new(part, duration))
        .collect();

    ScriptContent::new(title, topic, narration, segments)
        .map_err(|e| SourceError::malformed(e.to_string()))
}

/// Hugging Face text generation. The model is asked for a JSON script and
/// the first `{...}` object in its output is parsed strictly.
pub struct HuggingFaceSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GeneratedScript {
    title: String,
    segments: Vec<Segment>,
}

impl HuggingFaceSource {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    fn prompt(topic: &str, timing: &ScriptTiming) -> String {
        format!(
            "Write a short YouTube Shorts script about '{topic}'. \
             Make it ~{target:.0} seconds long. \
             Provide {count} short segments, each with one-sentence content. \
             Return JSON exactly like: \
             {{\"title\":..., \"segments\":[{{\"text\":...,\"duration\":seconds}}, ...]}}",
            target = timing.target_seconds,
            count = timing.segment_count,
        )
    }
}

#[async_trait]
impl TextSource for HuggingFaceSource {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn fetch(
        &self,
        topic: &str,
        timing: &ScriptTiming,
    ) -> Result<ScriptContent, SourceError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "inputs": Self::prompt(topic, timing),
                "options": { "wait_for_model": true },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let body = response.json::<serde_json::Value>().await?;

        parse_generated(&body, topic, timing)
    }
}

/// Parse the model output. Segment text is kept; durations are reassigned
/// from `timing` since the model only guesses them.
pub fn parse_generated(
    body: &serde_json::Value,
    topic: &str,
    timing: &ScriptTiming,
) -> Result<ScriptContent, SourceError> {
    if let Some(error) = body["error"].as_str() {
        return Err(SourceError::malformed(format!("inference error: {error}")));
    }

    let generated = body[0]["generated_text"]
        .as_str()
        .ok_or_else(|| SourceError::malformed("generated_text missing"))?;

    let start = generated.find('{');
    let end = generated.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &generated[start..=end],
        _ => return Err(SourceError::malformed("no JSON object in generated text")),
    };

    let script: GeneratedScript =
        serde_json::from_str(json).map_err(|e| SourceError::malformed(e.to_string()))?;
    if script.segments.iter().any(|s| s.text.trim().is_empty()) {
        return Err(SourceError::malformed("segment with empty text"));
    }
    if !SEGMENT_RANGE.contains(&script.segments.len()) {
        return Err(SourceError::malformed(format!(
            "{} segments, expected {}-{}",
            script.segments.len(),
            SEGMENT_RANGE.start(),
            SEGMENT_RANGE.end()
        )));
    }
    let duration = timing.segment_duration(script.segments.len());
    let segments: Vec<Segment> = script
        .segments
        .iter()
        .map(|s| Segment::new(s.text.trim(), duration))
        .collect();

    let title = if script.title.trim().is_empty() {
        format!("{} — Quick Tip", title_case(topic))
    } else {
        script.title.trim().to_string()
    };
    let narration = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    ScriptContent::new(title, topic, narration, segments)
        .map_err(|e| SourceError::malformed(e.to_string()))
}
