use serde::{Deserialize, Serialize};

use super::Tracker;
use crate::error::{AisimError, Result};

const MAX_PROMPT_CHARS: usize = 500;

/// One visitor message to the lead-capture chat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadChatRequest {
    pub asset_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadChatReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload<'a> {
    session_id: &'a str,
    #[serde(flatten)]
    request: &'a LeadChatRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutPayload<'a> {
    lead_id: &'a str,
    asset_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutReply {
    checkout_url: Option<String>,
}

/// Turns a focused artifact into a lead conversation or a checkout link.
#[derive(Debug, Clone)]
pub struct LeadRelay {
    tracker: Tracker,
}

impl LeadRelay {
    pub fn new(tracker: Tracker) -> Self {
        Self { tracker }
    }

    pub async fn send_chat_message(&self, request: &LeadChatRequest) -> Option<LeadChatReply> {
        if !self.tracker.is_configured() {
            return None;
        }
        let identity = self.tracker.identity().await;
        let payload = ChatPayload {
            session_id: &identity.session_id,
            request,
        };
        let result = async {
            let resp = self
                .tracker
                .post("aisim/lead-chat", &payload, Some(self.tracker.asset_timeout()))
                .await?;
            Ok::<_, AisimError>(resp.json::<LeadChatReply>().await?)
        }
        .await;

        result
            .inspect_err(|e| tracing::warn!(error = %e, "lead chat message failed"))
            .ok()
    }

    /// Ask the relay for a payment checkout link for `asset_id`.
    pub async fn create_checkout(&self, lead_id: &str, asset_id: &str) -> Option<String> {
        if !self.tracker.is_configured() {
            return None;
        }
        let payload = CheckoutPayload { lead_id, asset_id };
        let result = async {
            let resp = self
                .tracker
                .post("aisim/create-checkout", &payload, Some(self.tracker.asset_timeout()))
                .await?;
            Ok::<_, AisimError>(resp.json::<CheckoutReply>().await?)
        }
        .await;

        match result {
            Ok(reply) => reply.checkout_url,
            Err(e) => {
                tracing::warn!(error = %e, "checkout creation failed");
                None
            }
        }
    }
}

/// Fields carried to the build-request contact form.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub build_id: Option<String>,
    pub asset_id: Option<String>,
    pub prompt: Option<String>,
    pub style_name: Option<String>,
    pub session_id: Option<String>,
}

/// Contact-form URL with the build request encoded in its query string.
pub fn build_request_url(base: &str, request: &BuildRequest) -> Result<String> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| AisimError::InvalidInput(format!("invalid contact form URL '{base}': {e}")))?;

    let prompt = request
        .prompt
        .as_ref()
        .map(|p| p.chars().take(MAX_PROMPT_CHARS).collect::<String>());
    let pairs: Vec<(&str, &str)> = [
        ("buildId", request.build_id.as_deref()),
        ("assetId", request.asset_id.as_deref()),
        ("prompt", prompt.as_deref()),
        ("style", request.style_name.as_deref()),
        ("session", request.session_id.as_deref()),
    ]
    .into_iter()
    .filter_map(|(key, value)| Some((key, value.filter(|v| !v.is_empty())?)))
    .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url.to_string())
}
