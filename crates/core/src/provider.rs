use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}")]
    MissingApiKey { provider_name: String },
}

/// Where narration text comes from before the local templates kick in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextSourceKind {
    /// Random quote API, no key required.
    #[default]
    Quotes,
    /// Hugging Face text generation inference.
    HuggingFace,
    /// Template library only.
    Local,
}

pub struct TextSourceConfig {
    pub api_url: &'static str,
    pub env_var: Option<&'static str>,
}

impl TextSourceKind {
    pub fn config(&self) -> TextSourceConfig {
        match self {
            TextSourceKind::Quotes => TextSourceConfig {
                api_url: "https://zenquotes.io/api/random",
                env_var: None,
            },
            TextSourceKind::HuggingFace => TextSourceConfig {
                api_url: "https://api-inference.huggingface.co/models/google/flan-t5-small",
                env_var: Some("HF_TOKEN"),
            },
            TextSourceKind::Local => TextSourceConfig {
                api_url: "",
                env_var: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextSourceKind::Quotes => "Quotes",
            TextSourceKind::HuggingFace => "HuggingFace",
            TextSourceKind::Local => "Local templates",
        }
    }

    /// Resolve the API key for this source from `lookup`, if it needs one.
    pub fn api_key(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<String>, ProviderError> {
        let Some(env_var) = self.config().env_var else {
            return Ok(None);
        };
        lookup(env_var)
            .filter(|key| !key.trim().is_empty())
            .map(Some)
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider_name: self.name().to_string(),
            })
    }
}

impl FromStr for TextSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quotes" | "quote" => Ok(TextSourceKind::Quotes),
            "huggingface" | "hf" => Ok(TextSourceKind::HuggingFace),
            "local" => Ok(TextSourceKind::Local),
            other => Err(format!("unknown text source {other:?}")),
        }
    }
}
