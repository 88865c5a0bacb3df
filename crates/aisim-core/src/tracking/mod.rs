//! Best-effort analytics for generated assets.
//!
//! Events go to an n8n-style webhook. Nothing here ever fails the caller:
//! unconfigured tracking returns immediately and every transport problem is
//! logged at `debug` and swallowed.

mod identity;
mod lead;

pub use identity::{fingerprint, TrackingIdentity, TrackingSession};
pub use lead::{build_request_url, BuildRequest, LeadChatReply, LeadChatRequest, LeadRelay};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::TrackingConfig;
use crate::error::{AisimError, Result};

/// Default webhook value shipped in templates; treated as "not configured".
const PLACEHOLDER_HOST: &str = "your-n8n-server.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Click,
    Hover,
    Copy,
    Download,
    Share,
    Favorite,
    RequestBuild,
    ChatMessage,
}

/// A completed artifact worth recording.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    pub prompt: String,
    pub style_name: String,
    pub html_content: String,
    pub generation_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// What the webhook hands back for a tracked asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReceipt {
    pub asset_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub asset_id: String,
    pub kind: InteractionKind,
    pub data: serde_json::Value,
}

impl InteractionEvent {
    pub fn new(asset_id: impl Into<String>, kind: InteractionKind) -> Self {
        Self {
            asset_id: asset_id.into(),
            kind,
            data: serde_json::json!({}),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetPayload<'a> {
    session_id: &'a str,
    fingerprint: &'a str,
    user_agent: &'a str,
    #[serde(flatten)]
    event: &'a AssetEvent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InteractionPayload<'a> {
    session_id: &'a str,
    asset_id: &'a str,
    #[serde(rename = "type")]
    kind: InteractionKind,
    data: &'a serde_json::Value,
}

struct TrackerInner {
    config: TrackingConfig,
    client: reqwest::Client,
    identity: OnceCell<TrackingIdentity>,
    session_path: Option<PathBuf>,
}

/// Cheap to clone; all clones share one identity.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl Tracker {
    /// Tracker persisting its session token under the user config directory.
    pub fn new(config: &TrackingConfig) -> Self {
        Self::with_session_path(config, TrackingSession::default_path())
    }

    pub fn with_session_path(config: &TrackingConfig, session_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config: config.clone(),
                client: reqwest::Client::new(),
                identity: OnceCell::new(),
                session_path,
            }),
        }
    }

    pub fn is_configured(&self) -> bool {
        let config = &self.inner.config;
        config.enabled
            && config
                .webhook_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty() && !url.contains(PLACEHOLDER_HOST))
    }

    /// The process-wide identity, computed on first use.
    pub async fn identity(&self) -> TrackingIdentity {
        self.inner
            .identity
            .get_or_init(|| async {
                let ttl = self.inner.config.session_ttl_hours;
                TrackingIdentity::resolve(self.inner.session_path.as_deref(), ttl)
            })
            .await
            .clone()
    }

    /// Record a generated asset. `None` when tracking is off or anything fails.
    pub async fn track_asset(&self, event: &AssetEvent) -> Option<AssetReceipt> {
        if !self.is_configured() {
            return None;
        }
        let identity = self.identity().await;
        let payload = AssetPayload {
            session_id: &identity.session_id,
            fingerprint: &identity.fingerprint,
            user_agent: user_agent(),
            event,
        };
        let timeout = Duration::from_millis(self.inner.config.asset_timeout_ms);

        let result = async {
            let resp = self
                .post("aisim/track-asset", &payload, Some(timeout))
                .await?;
            Ok::<_, AisimError>(resp.json::<AssetReceipt>().await?)
        }
        .await;

        match result {
            Ok(receipt) => {
                tracing::debug!(asset_id = %receipt.asset_id, "asset tracked");
                Some(receipt)
            }
            Err(e) => {
                tracing::debug!(error = %e, "asset tracking failed");
                None
            }
        }
    }

    pub async fn track_interaction(&self, event: &InteractionEvent) {
        if !self.is_configured() {
            return;
        }
        let identity = self.identity().await;
        let payload = InteractionPayload {
            session_id: &identity.session_id,
            asset_id: &event.asset_id,
            kind: event.kind,
            data: &event.data,
        };
        let timeout = Duration::from_millis(self.inner.config.interaction_timeout_ms);
        if let Err(e) = self
            .post("aisim/track-interaction", &payload, Some(timeout))
            .await
        {
            tracing::debug!(error = %e, kind = ?event.kind, "interaction tracking failed");
        }
    }

    pub fn lead_relay(&self) -> LeadRelay {
        LeadRelay::new(self.clone())
    }

    pub(crate) fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.asset_timeout_ms)
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let base = self
            .inner
            .config
            .webhook_url
            .as_deref()
            .ok_or_else(|| AisimError::Tracking("webhook_url is not set".into()))?;
        let url = format!("{}/{path}", base.trim_end_matches('/'));

        let mut request = self.inner.client.post(&url).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| AisimError::Tracking(format!("POST {url} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AisimError::Tracking(format!(
                "POST {url} returned {}",
                resp.status()
            )));
        }
        Ok(resp)
    }
}

fn user_agent() -> &'static str {
    concat!("aisim/", env!("CARGO_PKG_VERSION"))
}
