mod scripted;
mod stream;

pub use scripted::{ScriptStep, ScriptedModel};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use crate::config::{self, LlmConfig};
use crate::error::{AisimError, Result};

/// One fragment of streamed model output. `text` may be empty but is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
}

impl TextChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl AsRef<str> for TextChunk {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Lazy, finite, non-restartable sequence of chunks from one streaming call.
pub type ChunkStream = BoxStream<'static, Result<TextChunk>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// The generative capability the pipeline consumes: submit a prompt and get
/// either one final text or a stream of text fragments.
///
/// Object safe so services can hold `Arc<dyn TextModel>`.
pub trait TextModel: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<String>>;

    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<ChunkStream>>;

    /// Model identifier reported with tracked assets.
    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LlmProvider {
    Gemini,
    OpenAI,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    fn name(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    fn default_env_var(self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::OpenAI => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

/// HTTP text generation over Gemini, OpenAI, Anthropic or Ollama.
pub struct LlmService {
    provider: LlmProvider,
    config: LlmConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

/// A fully prepared provider request.
struct PreparedRequest {
    url: String,
    headers: Vec<(&'static str, String)>,
    body: Value,
}

impl LlmService {
    /// Create an LLM service from configuration.
    ///
    /// Fails before any request is made when the provider is unknown or its
    /// API key cannot be resolved.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "gemini" => LlmProvider::Gemini,
            "openai" => LlmProvider::OpenAI,
            "anthropic" | "claude" => LlmProvider::Anthropic,
            "ollama" => LlmProvider::Ollama,
            other => {
                return Err(AisimError::Config(format!(
                    "unknown LLM provider: '{other}' (expected 'gemini', 'openai', 'anthropic', or 'ollama')"
                )));
            }
        };

        let api_key = provider
            .default_env_var()
            .map(|env_var| config::resolve_api_key(config, env_var))
            .transpose()?;

        Ok(Self {
            provider,
            config: config.clone(),
            api_key,
            client: reqwest::Client::new(),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
    }

    fn key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    fn prepare(&self, prompt: &str, options: &GenerateOptions, stream: bool) -> PreparedRequest {
        let base_url = self.base_url();
        let model = &self.config.model;
        let max_tokens = self.config.max_tokens;

        match self.provider {
            LlmProvider::Gemini => {
                let url = if stream {
                    format!(
                        "{base_url}/v1beta/models/{model}:streamGenerateContent?alt=sse&key={}",
                        self.key()
                    )
                } else {
                    format!(
                        "{base_url}/v1beta/models/{model}:generateContent?key={}",
                        self.key()
                    )
                };
                let mut generation_config = json!({ "maxOutputTokens": max_tokens });
                if let Some(t) = options.temperature {
                    generation_config["temperature"] = json!(t);
                }
                PreparedRequest {
                    url,
                    headers: Vec::new(),
                    body: json!({
                        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                        "generationConfig": generation_config,
                    }),
                }
            }
            LlmProvider::OpenAI => {
                let mut body = json!({
                    "model": model,
                    "messages": [{"role": "user", "content": prompt}],
                    "max_tokens": max_tokens,
                    "stream": stream,
                });
                if let Some(t) = options.temperature {
                    body["temperature"] = json!(t);
                }
                PreparedRequest {
                    url: format!("{base_url}/v1/chat/completions"),
                    headers: vec![("Authorization", format!("Bearer {}", self.key()))],
                    body,
                }
            }
            LlmProvider::Anthropic => {
                let mut body = json!({
                    "model": model,
                    "max_tokens": max_tokens,
                    "messages": [{"role": "user", "content": prompt}],
                    "stream": stream,
                });
                if let Some(t) = options.temperature {
                    // Anthropic caps temperature at 1.0
                    body["temperature"] = json!(t.min(1.0));
                }
                PreparedRequest {
                    url: format!("{base_url}/v1/messages"),
                    headers: vec![
                        ("x-api-key", self.key().to_string()),
                        ("anthropic-version", "2023-06-01".to_string()),
                    ],
                    body,
                }
            }
            LlmProvider::Ollama => {
                let mut ollama_options = json!({ "num_predict": max_tokens });
                if let Some(t) = options.temperature {
                    ollama_options["temperature"] = json!(t);
                }
                PreparedRequest {
                    url: format!("{base_url}/api/generate"),
                    headers: Vec::new(),
                    body: json!({
                        "model": model,
                        "prompt": prompt,
                        "stream": stream,
                        "options": ollama_options,
                    }),
                }
            }
        }
    }

    async fn send(&self, request: PreparedRequest) -> Result<reqwest::Response> {
        let name = self.provider.name();
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (header, value) in request.headers {
            builder = builder.header(header, value);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| AisimError::Llm(format!("{name} LLM request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AisimError::Llm(format!("{name} LLM error {status}: {text}")));
        }
        Ok(resp)
    }

    /// Generate the complete text for `prompt`.
    pub async fn generate_text(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let request = self.prepare(prompt, options, false);
        let resp = self.send(request).await?;
        let json: Value = resp.json().await.map_err(|e| {
            AisimError::Llm(format!(
                "{} LLM response parse error: {e}",
                self.provider.name()
            ))
        })?;
        extract_text(self.provider, &json)
    }

    /// Start a streaming generation for `prompt`.
    pub async fn stream_text(&self, prompt: &str, options: &GenerateOptions) -> Result<ChunkStream> {
        let request = self.prepare(prompt, options, true);
        let resp = self.send(request).await?;
        tracing::debug!(provider = self.provider.name(), model = %self.config.model, "stream opened");
        Ok(stream::chunk_stream(resp, self.provider))
    }
}

impl TextModel for LlmService {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.generate_text(prompt, options))
    }

    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<ChunkStream>> {
        Box::pin(self.stream_text(prompt, options))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Pull the generated text out of a non-streaming response body.
fn extract_text(provider: LlmProvider, json: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::Gemini => {
            let parts = json["candidates"][0]["content"]["parts"].as_array();
            parts.map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
        }
        LlmProvider::OpenAI => json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string),
        LlmProvider::Anthropic => json["content"][0]["text"].as_str().map(str::to_string),
        LlmProvider::Ollama => json["response"].as_str().map(str::to_string),
    };

    text.ok_or_else(|| {
        AisimError::Llm(format!(
            "{} LLM response missing text content",
            provider.name()
        ))
    })
}
