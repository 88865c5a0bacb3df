use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::StreamExt;

use crate::brand::ensure_brand_prefix;
use crate::config::GenerationConfig;
use crate::error::{AisimError, Result};
use crate::extract::json_array_span;
use crate::llm::{GenerateOptions, TextModel};
use crate::model::{Session, ARTIFACTS_PER_SESSION};
use crate::prompts::{self, FALLBACK_STYLE_NAMES};
use crate::retry::with_retry;
use crate::store::SessionStore;
use crate::tracking::{AssetEvent, Tracker};

/// Drives a session from prompt to settled artifacts.
///
/// Style naming runs first (non-streaming), then one streaming request per
/// artifact, all concurrently. Each stream publishes its accumulated html into
/// the store on every chunk; loading clears only after all reach a terminal state.
#[derive(Clone)]
pub struct ArtifactGenerator {
    model: Arc<dyn TextModel>,
    store: SessionStore,
    settings: GenerationConfig,
    tracker: Option<Tracker>,
}

impl ArtifactGenerator {
    pub fn new(model: Arc<dyn TextModel>, store: SessionStore, settings: &GenerationConfig) -> Self {
        Self {
            model,
            store,
            settings: settings.clone(),
            tracker: None,
        }
    }

    /// Report completed artifacts through `tracker`.
    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start a session for `prompt` and run it to completion.
    pub async fn generate(&self, prompt: &str) -> Result<Session> {
        let session = self.store.start_session(prompt)?;
        self.run(&session).await;
        self.store
            .snapshot()
            .sessions
            .into_iter()
            .find(|s| s.id == session.id)
            .ok_or_else(|| AisimError::NotFound(format!("session {}", session.id)))
    }

    /// Run an already started session. Never fails: every problem ends up as
    /// an artifact in `error`.
    pub async fn run(&self, session: &Session) {
        let started = Instant::now();
        let styles = self.style_names(&session.prompt).await;
        let ids: Vec<String> = session.artifacts.iter().map(|a| a.id.clone()).collect();
        self.store.set_style_names(&ids, &styles);

        let jobs = ids
            .iter()
            .zip(&styles)
            .map(|(id, style)| self.generate_artifact(&session.prompt, id, style));
        join_all(jobs).await;

        self.store.finish_loading();
        tracing::info!(
            session_id = %session.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session settled"
        );
    }

    async fn style_names(&self, prompt: &str) -> Vec<String> {
        let request = prompts::style_names_prompt(prompt);
        let options = GenerateOptions::default();
        let reply = with_retry(
            self.settings.style_retries,
            self.settings.retry_base_delay_ms,
            || self.model.generate(&request, &options),
        )
        .await;

        match reply {
            Ok(text) => parse_style_names(&text),
            Err(e) => {
                tracing::warn!(error = %e, "style naming failed, using fallback names");
                fallback_style_names()
            }
        }
    }

    async fn generate_artifact(&self, prompt: &str, artifact_id: &str, style: &str) {
        let started = Instant::now();
        match self.stream_artifact(prompt, artifact_id, style).await {
            Ok(html) => {
                let applied = self.store.complete_artifact(artifact_id, html.clone());
                tracing::debug!(artifact_id, applied, bytes = html.len(), "artifact complete");
                if applied {
                    self.report(AssetEvent {
                        prompt: prompt.to_string(),
                        style_name: style.to_string(),
                        html_content: html,
                        generation_time_ms: started.elapsed().as_millis() as u64,
                        model_used: Some(self.model.model_id().to_string()),
                    });
                }
            }
            Err(e) => {
                tracing::error!(artifact_id, error = %e, "artifact generation failed");
                self.store.fail_artifact(artifact_id, &e.to_string());
            }
        }
    }

    async fn stream_artifact(&self, prompt: &str, artifact_id: &str, style: &str) -> Result<String> {
        let request = prompts::artifact_prompt(prompt, style);
        let options = GenerateOptions::default();
        let mut chunks = self.model.generate_stream(&request, &options).await?;
        let idle = self.settings.stream_idle_timeout_secs.map(Duration::from_secs);

        let mut html = String::new();
        loop {
            let next = match idle {
                Some(limit) => tokio::time::timeout(limit, chunks.next())
                    .await
                    .map_err(|_| {
                        AisimError::Llm(format!(
                            "stream produced nothing for {}s, timed out",
                            limit.as_secs()
                        ))
                    })?,
                None => chunks.next().await,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if chunk.text.is_empty() {
                continue;
            }
            html.push_str(&chunk.text);
            self.store.publish_html(artifact_id, &html);
        }

        let trimmed = trim_code_fences(&html);
        if trimmed.is_empty() {
            return Err(AisimError::Llm("model returned no content".into()));
        }
        Ok(trimmed.to_string())
    }

    fn report(&self, event: AssetEvent) {
        let Some(tracker) = self.tracker.clone() else {
            return;
        };
        if !tracker.is_configured() {
            return;
        }
        tokio::spawn(async move {
            tracker.track_asset(&event).await;
        });
    }
}

fn fallback_style_names() -> Vec<String> {
    FALLBACK_STYLE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Pull three branded style names out of a naming reply.
///
/// Falls back to the fixed set when no array parses or fewer than three names arrive.
pub fn parse_style_names(reply: &str) -> Vec<String> {
    let parsed = json_array_span(reply).and_then(|span| {
        serde_json::from_str::<Vec<String>>(span)
            .inspect_err(|e| tracing::warn!(error = %e, "unparsable style names"))
            .ok()
    });

    let names = match parsed {
        Some(names) if names.len() >= ARTIFACTS_PER_SESSION => names,
        _ => {
            tracing::warn!("style naming returned too few names, using fallbacks");
            fallback_style_names()
        }
    };

    names
        .into_iter()
        .take(ARTIFACTS_PER_SESSION)
        .map(|n| ensure_brand_prefix(&n))
        .collect()
}

/// Strip optional markdown code fences wrapping a generated document.
pub fn trim_code_fences(text: &str) -> &str {
    let mut html = text.trim();
    if let Some(rest) = html.strip_prefix("```html") {
        html = rest.trim_start();
    }
    if let Some(rest) = html.strip_prefix("```") {
        html = rest.trim_start();
    }
    if let Some(rest) = html.strip_suffix("```") {
        html = rest.trim_end();
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptStep, ScriptedModel};
    use crate::model::ArtifactStatus;

    const STYLES: &str = r#"["Frosted Lattice", "AiSim Ink Relief", "Neon Wire"]"#;

    fn settings() -> GenerationConfig {
        GenerationConfig {
            retry_base_delay_ms: 1,
            ..Default::default()
        }
    }

    fn generator(model: ScriptedModel) -> ArtifactGenerator {
        ArtifactGenerator::new(Arc::new(model), SessionStore::new(), &settings())
    }

    #[test]
    fn test_trim_code_fences() {
        assert_eq!(trim_code_fences("```html\n<div></div>\n```"), "<div></div>");
        assert_eq!(trim_code_fences("  ```\n<p>x</p>```  "), "<p>x</p>");
        assert_eq!(trim_code_fences("<div>plain</div>"), "<div>plain</div>");
        assert_eq!(trim_code_fences("```html\n```"), "");
        assert_eq!(trim_code_fences("   \n"), "");
    }

    #[test]
    fn test_parse_style_names_from_prose() {
        let names = parse_style_names(&format!("Here are three:\n{STYLES}\nEnjoy"));
        assert_eq!(
            names,
            vec!["AiSim Frosted Lattice", "AiSim Ink Relief", "AiSim Neon Wire"]
        );
    }

    #[test]
    fn test_parse_style_names_truncates_and_trims() {
        let names = parse_style_names(r#"["  A ", "B", "C", "D"]"#);
        assert_eq!(names, vec!["AiSim A", "AiSim B", "AiSim C"]);
    }

    #[test]
    fn test_parse_style_names_fallbacks() {
        let fallback = fallback_style_names();
        assert_eq!(parse_style_names("no array"), fallback);
        assert_eq!(parse_style_names(r#"["only", "two"]"#), fallback);
        assert_eq!(parse_style_names("[not json]"), fallback);
        assert_eq!(parse_style_names("[1, 2, 3]"), fallback);
    }

    #[tokio::test]
    async fn test_generate_names_and_completes() {
        let model = ScriptedModel::new()
            .with_reply("design directions", STYLES)
            .with_stream("Frosted Lattice", ScriptStep::chunked("```html\n<div>a</div>\n```", 5))
            .with_stream("Ink Relief", ScriptStep::chunked("<div>b</div>", 3))
            .with_stream("Neon Wire", vec![ScriptStep::chunk("<div>c</div>")]);
        let gen = generator(model);

        let session = gen.generate("glass clock").await.unwrap();
        let html: Vec<&str> = session.artifacts.iter().map(|a| a.html.as_str()).collect();
        assert_eq!(html, vec!["<div>a</div>", "<div>b</div>", "<div>c</div>"]);
        assert_eq!(session.artifacts[0].style_name, "AiSim Frosted Lattice");
        assert!(session.is_settled());
        assert!(!gen.store().snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_naming_failure_uses_fallbacks() {
        let mut model = ScriptedModel::new().with_failing_reply("design directions", "401 unauthorized");
        for name in FALLBACK_STYLE_NAMES {
            model = model.with_stream(name, vec![ScriptStep::chunk("<p>ok</p>")]);
        }
        let session = generator(model).generate("x").await.unwrap();
        let styles: Vec<&str> = session.artifacts.iter().map(|a| a.style_name.as_str()).collect();
        assert_eq!(styles, FALLBACK_STYLE_NAMES.to_vec());
        assert!(session
            .artifacts
            .iter()
            .all(|a| a.status == ArtifactStatus::Complete));
    }

    #[tokio::test]
    async fn test_naming_retries_transient_errors() {
        let model = Arc::new(
            ScriptedModel::new().with_failing_reply("design directions", "503 Service Unavailable"),
        );
        let gen = ArtifactGenerator::new(model.clone(), SessionStore::new(), &settings());
        let session = gen.generate("x").await.unwrap();
        let naming_calls = model
            .prompts()
            .iter()
            .filter(|p| p.contains("design directions"))
            .count();
        assert_eq!(naming_calls, settings().style_retries + 1);
        assert!(session
            .artifacts
            .iter()
            .all(|a| a.status == ArtifactStatus::Error));
    }

    #[tokio::test]
    async fn test_empty_stream_is_error() {
        let model = ScriptedModel::new()
            .with_reply("design directions", STYLES)
            .with_stream("Frosted Lattice", vec![ScriptStep::chunk("```html\n"), ScriptStep::chunk("```")])
            .with_stream("Ink Relief", vec![])
            .with_stream("Neon Wire", vec![ScriptStep::chunk("<i>ok</i>")]);
        let session = generator(model).generate("x").await.unwrap();
        assert_eq!(session.artifacts[0].status, ArtifactStatus::Error);
        assert!(session.artifacts[0].html.contains("no content"));
        assert_eq!(session.artifacts[1].status, ArtifactStatus::Error);
        assert_eq!(session.artifacts[2].status, ArtifactStatus::Complete);
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_error() {
        let model = ScriptedModel::new()
            .with_reply("design directions", STYLES)
            .with_stream_open_failure("Frosted Lattice", "quota exceeded")
            .with_stream("Ink Relief", vec![ScriptStep::chunk("<b>1</b>")])
            .with_stream("Neon Wire", vec![ScriptStep::chunk("<b>2</b>")]);
        let session = generator(model).generate("x").await.unwrap();
        assert_eq!(session.artifacts[0].status, ArtifactStatus::Error);
        assert!(session.artifacts[0].html.contains("quota exceeded"));
        assert_eq!(session.artifacts[1].html, "<b>1</b>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_fails_hung_stream() {
        let model = ScriptedModel::new()
            .with_reply("design directions", STYLES)
            .with_stream(
                "Frosted Lattice",
                vec![
                    ScriptStep::chunk("<div>"),
                    ScriptStep::Pause(Duration::from_secs(600)),
                    ScriptStep::chunk("</div>"),
                ],
            )
            .with_stream("Ink Relief", vec![ScriptStep::chunk("<b>1</b>")])
            .with_stream("Neon Wire", vec![ScriptStep::chunk("<b>2</b>")]);
        let settings = GenerationConfig {
            stream_idle_timeout_secs: Some(5),
            ..settings()
        };
        let gen = ArtifactGenerator::new(Arc::new(model), SessionStore::new(), &settings);
        let session = gen.generate("x").await.unwrap();
        assert_eq!(session.artifacts[0].status, ArtifactStatus::Error);
        assert!(session.artifacts[0].html.contains("timed out"));
        assert_eq!(session.artifacts[1].status, ArtifactStatus::Complete);
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_prompt() {
        let gen = generator(ScriptedModel::new());
        assert!(matches!(
            gen.generate("   ").await,
            Err(AisimError::InvalidInput(_))
        ));
        assert!(gen.store().snapshot().sessions.is_empty());
    }
}
