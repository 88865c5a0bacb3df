use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AisimError, Result};

/// Number of artifacts generated for every session. Fixed at creation.
pub const ARTIFACTS_PER_SESSION: usize = 3;

/// Style label shown until the style-naming call returns.
pub const PLACEHOLDER_STYLE_NAME: &str = "AiSim Designing...";

pub const MAX_PROMPT_LENGTH: usize = 4_000;

/// Validate and trim a user prompt.
pub fn normalize_prompt(prompt: &str) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(AisimError::InvalidInput("prompt cannot be empty".into()));
    }
    if trimmed.len() > MAX_PROMPT_LENGTH {
        return Err(AisimError::InvalidInput(format!(
            "prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Streaming,
    Complete,
    Error,
}

impl ArtifactStatus {
    /// `Complete` and `Error` never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One generated design candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub style_name: String,
    pub html: String,
    pub status: ArtifactStatus,
}

impl Artifact {
    /// Streaming placeholder for slot `position` of `session_id`.
    pub fn placeholder(session_id: &str, position: usize) -> Self {
        Self {
            id: artifact_id(session_id, position),
            style_name: PLACEHOLDER_STYLE_NAME.to_string(),
            html: String::new(),
            status: ArtifactStatus::Streaming,
        }
    }
}

/// Artifact ids are derived from the owning session id and the slot position.
pub fn artifact_id(session_id: &str, position: usize) -> String {
    format!("{session_id}_{position}")
}

/// One prompt submission and its fixed batch of artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub artifacts: Vec<Artifact>,
}

impl Session {
    pub fn new(prompt: String) -> Self {
        let id = Uuid::now_v7().simple().to_string();
        let artifacts = (0..ARTIFACTS_PER_SESSION)
            .map(|i| Artifact::placeholder(&id, i))
            .collect();
        Self {
            id,
            prompt,
            created_at: Utc::now(),
            artifacts,
        }
    }

    pub fn artifact(&self, artifact_id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == artifact_id)
    }

    pub(crate) fn artifact_mut(&mut self, artifact_id: &str) -> Option<&mut Artifact> {
        self.artifacts.iter_mut().find(|a| a.id == artifact_id)
    }

    /// `true` once every artifact reached `complete` or `error`.
    pub fn is_settled(&self) -> bool {
        self.artifacts.iter().all(|a| a.status.is_terminal())
    }
}

/// Inline notice that replaces an artifact's html when generation fails.
pub fn error_notice(message: &str) -> String {
    format!(
        r#"<div style="color: #ff6b6b; padding: 20px;">Error: {}</div>"#,
        html_escape(message)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
