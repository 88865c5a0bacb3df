use crate::error::{AisimError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AisimConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            env_var: None,
            max_tokens: default_llm_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Retries for the non-streaming style-naming call. Artifact streams are never retried.
    #[serde(default = "default_style_retries")]
    pub style_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_variation_temperature")]
    pub variation_temperature: f32,
    /// Fail an artifact when its stream stays silent this long. Unset means wait forever.
    #[serde(default)]
    pub stream_idle_timeout_secs: Option<u64>,
    #[serde(default = "default_placeholder_count")]
    pub placeholder_count: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            style_retries: default_style_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            variation_temperature: default_variation_temperature(),
            stream_idle_timeout_secs: None,
            placeholder_count: default_placeholder_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the n8n webhook relay, e.g. `https://n8n.example.com/webhook`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_asset_timeout_ms")]
    pub asset_timeout_ms: u64,
    #[serde(default = "default_interaction_timeout_ms")]
    pub interaction_timeout_ms: u64,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            asset_timeout_ms: default_asset_timeout_ms(),
            interaction_timeout_ms: default_interaction_timeout_ms(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// Valid LLM provider names.
pub const VALID_LLM_PROVIDERS: &[&str] = &["gemini", "openai", "anthropic", "claude", "ollama"];

// -- Defaults --

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_llm_max_tokens() -> usize {
    8192
}
fn default_style_retries() -> usize {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    250
}
fn default_variation_temperature() -> f32 {
    1.2
}
fn default_placeholder_count() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_asset_timeout_ms() -> u64 {
    5000
}
fn default_interaction_timeout_ms() -> u64 {
    3000
}
fn default_session_ttl_hours() -> u64 {
    24
}
fn default_web_port() -> u16 {
    37740
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

impl AisimConfig {
    /// Load configuration with three-layer TOML merge:
    /// 1. ~/.config/aisim/config.toml (global)
    /// 2. .aisim/config.toml (project)
    /// 3. .aisim/config.local.toml (local, gitignored)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(dir) = project_dir {
            for name in ["config.toml", "config.local.toml"] {
                let path = dir.join(".aisim").join(name);
                if path.exists() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        let config = builder
            .build()
            .map_err(|e| AisimError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| AisimError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Validate config values, clamping out-of-range values and logging warnings.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !VALID_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            warnings.push(format!(
                "unknown LLM provider '{}', valid: {}",
                self.llm.provider,
                VALID_LLM_PROVIDERS.join(", ")
            ));
        }

        if self.llm.max_tokens == 0 {
            warnings.push("llm.max_tokens = 0, setting to 1024".to_string());
            self.llm.max_tokens = 1024;
        }

        let temp = self.generation.variation_temperature;
        if !(0.0..=2.0).contains(&temp) {
            warnings.push(format!(
                "generation.variation_temperature = {temp} out of range [0.0, 2.0], clamping"
            ));
            self.generation.variation_temperature = temp.clamp(0.0, 2.0);
        }

        if self.generation.stream_idle_timeout_secs == Some(0) {
            warnings.push("generation.stream_idle_timeout_secs = 0, disabling".to_string());
            self.generation.stream_idle_timeout_secs = None;
        }

        if self.generation.placeholder_count == 0 {
            warnings.push("generation.placeholder_count = 0, setting to 1".to_string());
            self.generation.placeholder_count = 1;
        }

        if self.tracking.asset_timeout_ms == 0 {
            warnings.push("tracking.asset_timeout_ms = 0, setting to 5000".to_string());
            self.tracking.asset_timeout_ms = default_asset_timeout_ms();
        }
        if self.tracking.interaction_timeout_ms == 0 {
            warnings.push("tracking.interaction_timeout_ms = 0, setting to 3000".to_string());
            self.tracking.interaction_timeout_ms = default_interaction_timeout_ms();
        }
        if self.tracking.session_ttl_hours == 0 {
            warnings.push("tracking.session_ttl_hours = 0, setting to 1".to_string());
            self.tracking.session_ttl_hours = 1;
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }
}

/// Directory holding global config and the tracking session token.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("aisim"))
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Resolve an API key: check config field first, then environment variable.
pub fn resolve_api_key(config: &LlmConfig, default_env_var: &str) -> Result<String> {
    if let Some(key) = config.api_key.as_deref() {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(default_env_var);

    std::env::var(env_var_name)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AisimError::Config(format!(
                "{} LLM provider requires an API key (set llm.api_key or {})",
                config.provider, env_var_name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AisimConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-3-flash-preview");
        assert_eq!(config.generation.style_retries, 2);
        assert!((config.generation.variation_temperature - 1.2).abs() < f32::EPSILON);
        assert!(config.generation.stream_idle_timeout_secs.is_none());
        assert_eq!(config.tracking.asset_timeout_ms, 5000);
        assert_eq!(config.tracking.interaction_timeout_ms, 3000);
        assert_eq!(config.tracking.session_ttl_hours, 24);
        assert_eq!(config.web.port, 37740);
    }

    #[test]
    fn test_load_config_no_project_files() {
        let config = AisimConfig::load(Some(Path::new("/nonexistent/path"))).unwrap();
        assert_eq!(config.generation.placeholder_count, 10);
    }

    #[test]
    fn test_project_layers_override() {
        let dir = std::env::temp_dir().join(format!("aisim-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(dir.join(".aisim")).unwrap();
        std::fs::write(
            dir.join(".aisim").join("config.toml"),
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join(".aisim").join("config.local.toml"),
            "[llm]\nmodel = \"gpt-4o\"\n",
        )
        .unwrap();

        let config = AisimConfig::load(Some(&dir)).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let toml_str = r#"
[tracking]
webhook_url = "https://n8n.example.com/webhook"
"#;
        let config: AisimConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.tracking.webhook_url.as_deref(),
            Some("https://n8n.example.com/webhook")
        );
        assert!(config.tracking.enabled);
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn test_validate_clamps_values() {
        let mut config = AisimConfig::default();
        config.generation.variation_temperature = 5.0;
        config.generation.stream_idle_timeout_secs = Some(0);
        config.llm.max_tokens = 0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!((config.generation.variation_temperature - 2.0).abs() < f32::EPSILON);
        assert!(config.generation.stream_idle_timeout_secs.is_none());
        assert_eq!(config.llm.max_tokens, 1024);
    }

    #[test]
    fn test_validate_unknown_provider_warns() {
        let mut config = AisimConfig::default();
        config.llm.provider = "banana".into();
        let warnings = config.validate();
        assert!(warnings[0].contains("unknown LLM provider"));
    }

    #[test]
    fn test_resolve_api_key_from_config() {
        let config = LlmConfig {
            api_key: Some("config-key".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config, "GEMINI_API_KEY").unwrap(), "config-key");
    }

    #[test]
    fn test_resolve_api_key_custom_env_var() {
        std::env::set_var("AISIM_TEST_LLM_KEY", "env-key");
        let config = LlmConfig {
            env_var: Some("AISIM_TEST_LLM_KEY".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config, "GEMINI_API_KEY").unwrap(), "env-key");
        std::env::remove_var("AISIM_TEST_LLM_KEY");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let config = LlmConfig {
            env_var: Some("AISIM_TEST_DEFINITELY_UNSET".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&config, "GEMINI_API_KEY").unwrap_err();
        assert!(err.to_string().contains("requires an API key"));
    }
}
