use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};

use super::{ChunkStream, GenerateOptions, TextChunk, TextModel};
use crate::error::{AisimError, Result};

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Deliver a fragment.
    Chunk(String),
    /// Wait before the next step.
    Pause(Duration),
    /// End the stream with an error.
    Fail(String),
}

impl ScriptStep {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk(text.into())
    }

    /// Split `text` into chunks of at most `size` characters.
    pub fn chunked(text: &str, size: usize) -> Vec<Self> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(size.max(1))
            .map(|c| Self::Chunk(c.iter().collect()))
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A [`TextModel`] that replays canned output instead of calling a provider.
///
/// Responses are matched by substring against the prompt, first match wins.
/// Every call is recorded so tests can assert on prompts and options.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Vec<(String, Reply)>,
    streams: Vec<(String, Vec<ScriptStep>)>,
    open_failures: Vec<(String, String)>,
    calls: Mutex<Vec<(String, GenerateOptions)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `generate` calls whose prompt contains `needle`.
    pub fn with_reply(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.replies.push((needle.into(), Reply::Text(text.into())));
        self
    }

    pub fn with_failing_reply(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies.push((needle.into(), Reply::Fail(message.into())));
        self
    }

    /// Stream `steps` for `generate_stream` calls whose prompt contains `needle`.
    pub fn with_stream(mut self, needle: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.streams.push((needle.into(), steps));
        self
    }

    /// Make `generate_stream` itself fail, before any chunk.
    pub fn with_stream_open_failure(
        mut self,
        needle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.open_failures.push((needle.into(), message.into()));
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default()
    }

    /// Options passed with the first call whose prompt contains `needle`.
    pub fn options_for(&self, needle: &str) -> Option<GenerateOptions> {
        let calls = self.calls.lock().ok()?;
        calls
            .iter()
            .find(|(p, _)| p.contains(needle))
            .map(|(_, o)| o.clone())
    }

    fn record(&self, prompt: &str, options: &GenerateOptions) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((prompt.to_string(), options.clone()));
        }
    }

    /// Offline model producing plausible output for every prompt the pipeline sends.
    pub fn demo() -> Self {
        let styles = r#"["AiSim Frosted Glass Lattice", "AiSim Letterpress Ink Relief", "AiSim Neon Wire Circuitry"]"#;
        let ideas = r#"["paper lantern playlist", "moss-covered file browser", "tidal chart stock ticker", "stained glass login form"]"#;

        let mut model = Self::new()
            .with_reply("design directions for:", format!("Here you go:\n{styles}"))
            .with_reply("UI component prompts", ideas);

        for (style, accent) in [
            ("AiSim Frosted Glass Lattice", "#9fd8ff"),
            ("AiSim Letterpress Ink Relief", "#c0392b"),
            ("AiSim Neon Wire Circuitry", "#39ff14"),
        ] {
            let html = demo_html(style, accent);
            let mut steps = vec![ScriptStep::chunk("```html\n")];
            steps.extend(ScriptStep::chunked(&html, 48).into_iter().flat_map(|s| {
                [s, ScriptStep::Pause(Duration::from_millis(15))]
            }));
            steps.push(ScriptStep::chunk("\n```"));
            model = model.with_stream(style, steps);
        }

        let variations = [
            ("Paper Fold Cascade", "#f5e6c8"),
            ("AiSim Chrome Droplet", "#d0d6dc"),
            ("Woven Textile Grid", "#8e5a3c"),
        ]
        .iter()
        .map(|(name, accent)| {
            serde_json::json!({ "name": name, "html": demo_html(name, accent) }).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n");
        let mut steps: Vec<ScriptStep> = ScriptStep::chunked(&variations, 64)
            .into_iter()
            .flat_map(|s| [s, ScriptStep::Pause(Duration::from_millis(10))])
            .collect();
        steps.insert(0, ScriptStep::chunk("```json\n"));
        model.with_stream("RADICAL CONCEPTUAL VARIATIONS", steps)
    }
}

fn demo_html(title: &str, accent: &str) -> String {
    format!(
        "<div style=\"font-family: system-ui; padding: 32px; border: 2px solid {accent}; \
border-radius: 12px;\"><h2 style=\"color: {accent};\">{title}</h2>\
<p>Generated offline.</p></div>"
    )
}

impl TextModel for ScriptedModel {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.record(prompt, options);
            match self.replies.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
                Some((_, Reply::Text(text))) => Ok(text.clone()),
                Some((_, Reply::Fail(message))) => Err(AisimError::Llm(message.clone())),
                None => Err(AisimError::Llm("no scripted reply for prompt".into())),
            }
        })
    }

    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<ChunkStream>> {
        Box::pin(async move {
            self.record(prompt, options);
            if let Some((_, message)) = self
                .open_failures
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
            {
                return Err(AisimError::Llm(message.clone()));
            }
            let steps = self
                .streams
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, steps)| steps.clone())
                .ok_or_else(|| AisimError::Llm("no scripted stream for prompt".into()))?;
            Ok(replay(steps))
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

fn replay(steps: Vec<ScriptStep>) -> ChunkStream {
    stream::unfold(steps.into_iter(), |mut steps| async move {
        loop {
            match steps.next()? {
                ScriptStep::Chunk(text) => {
                    // let sibling streams interleave
                    tokio::task::yield_now().await;
                    return Some((Ok(TextChunk::new(text)), steps));
                }
                ScriptStep::Pause(duration) => tokio::time::sleep(duration).await,
                ScriptStep::Fail(message) => {
                    // drop the remaining steps so the stream ends after the error
                    return Some((Err(AisimError::Llm(message)), Vec::new().into_iter()));
                }
            }
        }
    })
    .boxed()
}
