//! The session/artifact state store.
//!
//! State is one versioned [`StoreSnapshot`] held in a `tokio::sync::watch`
//! channel. Every mutation goes through [`SessionStore::update`], which bumps
//! `version` only when something changed. Observers either read a copy with
//! [`SessionStore::snapshot`] or [`SessionStore::subscribe`]; a receiver always
//! sees the latest value, so bursts of fragment updates coalesce without the
//! final one ever being lost.
//!
//! Artifact writes are keyed by artifact id. A write whose id no longer exists,
//! or whose artifact already reached a terminal status, is ignored and reported
//! as not applied.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::brand::ensure_brand_prefix;
use crate::error::{AisimError, Result};
use crate::model::{
    error_notice, normalize_prompt, Artifact, ArtifactStatus, ComponentVariation, Session,
    VariationSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Back,
    Forward,
}

/// Pure data view of everything the store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub version: u64,
    pub sessions: Vec<Session>,
    pub current_session: Option<usize>,
    /// `None` is grid mode, `Some(i)` focuses artifact `i` of the current session.
    pub focused_artifact: Option<usize>,
    pub is_loading: bool,
    /// Open variations drawer, if any.
    pub variations: Option<VariationSet>,
}

impl StoreSnapshot {
    pub fn current(&self) -> Option<&Session> {
        self.sessions.get(self.current_session?)
    }

    pub fn focused(&self) -> Option<&Artifact> {
        self.current()?.artifacts.get(self.focused_artifact?)
    }

    pub fn find_artifact(&self, artifact_id: &str) -> Option<&Artifact> {
        self.sessions.iter().find_map(|s| s.artifact(artifact_id))
    }

    pub fn can_go_back(&self) -> bool {
        match (self.focused_artifact, self.current_session) {
            (Some(focused), _) => focused > 0,
            (None, Some(current)) => current > 0,
            (None, None) => false,
        }
    }

    pub fn can_go_forward(&self) -> bool {
        match (self.focused_artifact, self.current_session) {
            (Some(focused), _) => {
                let len = self.current().map_or(0, |s| s.artifacts.len());
                focused + 1 < len
            }
            (None, Some(current)) => current + 1 < self.sessions.len(),
            (None, None) => false,
        }
    }

    fn streaming_artifact_mut(&mut self, artifact_id: &str) -> Option<&mut Artifact> {
        self.sessions
            .iter_mut()
            .find_map(|s| s.artifact_mut(artifact_id))
            .filter(|a| !a.status.is_terminal())
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<StoreSnapshot>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    /// Apply `f`; when it reports a change, bump the version and notify observers.
    fn update(&self, f: impl FnOnce(&mut StoreSnapshot) -> bool) -> bool {
        self.tx.send_if_modified(|state| {
            let changed = f(state);
            if changed {
                state.version += 1;
            }
            changed
        })
    }

    /// Append a new session with streaming placeholders and select it.
    ///
    /// Fails for blank prompts and while another generation is loading.
    pub fn start_session(&self, prompt: &str) -> Result<Session> {
        let prompt = normalize_prompt(prompt)?;
        let mut started = None;
        self.update(|state| {
            if state.is_loading {
                return false;
            }
            let session = Session::new(prompt);
            state.sessions.push(session.clone());
            state.current_session = Some(state.sessions.len() - 1);
            state.focused_artifact = None;
            state.variations = None;
            state.is_loading = true;
            started = Some(session);
            true
        });
        let session = started
            .ok_or_else(|| AisimError::InvalidInput("a generation is already in progress".into()))?;
        tracing::info!(session_id = %session.id, "session started");
        Ok(session)
    }

    pub fn set_style_name(&self, artifact_id: &str, style_name: &str) -> bool {
        let style_name = ensure_brand_prefix(style_name);
        self.update(|state| match state.streaming_artifact_mut(artifact_id) {
            Some(artifact) if artifact.style_name != style_name => {
                artifact.style_name = style_name;
                true
            }
            _ => false,
        })
    }

    /// Write one style name per artifact, in position order. Returns how many applied.
    pub fn set_style_names(&self, artifact_ids: &[String], style_names: &[String]) -> usize {
        artifact_ids
            .iter()
            .zip(style_names)
            .filter(|(id, name)| self.set_style_name(id, name))
            .count()
    }

    /// Replace a streaming artifact's html with the full text accumulated so far.
    pub fn publish_html(&self, artifact_id: &str, html: &str) -> bool {
        self.update(|state| match state.streaming_artifact_mut(artifact_id) {
            Some(artifact) if artifact.html != html => {
                artifact.html.clear();
                artifact.html.push_str(html);
                true
            }
            _ => false,
        })
    }

    pub fn complete_artifact(&self, artifact_id: &str, html: String) -> bool {
        self.update(|state| match state.streaming_artifact_mut(artifact_id) {
            Some(artifact) => {
                artifact.html = html;
                artifact.status = ArtifactStatus::Complete;
                true
            }
            None => false,
        })
    }

    /// Move a streaming artifact to `error`, replacing its html with an inline notice.
    pub fn fail_artifact(&self, artifact_id: &str, message: &str) -> bool {
        self.update(|state| match state.streaming_artifact_mut(artifact_id) {
            Some(artifact) => {
                artifact.html = error_notice(message);
                artifact.status = ArtifactStatus::Error;
                true
            }
            None => false,
        })
    }

    pub fn finish_loading(&self) {
        self.update(|state| std::mem::replace(&mut state.is_loading, false));
    }

    pub fn focus(&self, index: usize) -> Result<()> {
        let mut result = Ok(());
        self.update(|state| {
            let Some(session) = state.current() else {
                result = Err(AisimError::NotFound("no current session".into()));
                return false;
            };
            if index >= session.artifacts.len() {
                result = Err(AisimError::InvalidInput(format!(
                    "artifact index {index} out of range (session has {})",
                    session.artifacts.len()
                )));
                return false;
            }
            state.focused_artifact.replace(index) != Some(index)
        });
        result
    }

    /// Return to grid mode.
    pub fn unfocus(&self) {
        self.update(|state| state.focused_artifact.take().is_some());
    }

    pub fn select_session(&self, index: usize) -> Result<()> {
        let mut result = Ok(());
        self.update(|state| {
            if index >= state.sessions.len() {
                result = Err(AisimError::NotFound(format!("session index {index}")));
                return false;
            }
            let changed = state.current_session != Some(index) || state.focused_artifact.is_some();
            state.current_session = Some(index);
            state.focused_artifact = None;
            changed
        });
        result
    }

    /// Move between artifacts in focus mode, between sessions in grid mode.
    /// Returns `false` at either end.
    pub fn navigate(&self, direction: Direction) -> bool {
        self.update(|state| {
            let allowed = match direction {
                Direction::Back => state.can_go_back(),
                Direction::Forward => state.can_go_forward(),
            };
            if !allowed {
                return false;
            }
            let slot = if state.focused_artifact.is_some() {
                &mut state.focused_artifact
            } else {
                &mut state.current_session
            };
            if let Some(i) = slot.as_mut() {
                match direction {
                    Direction::Back => *i -= 1,
                    Direction::Forward => *i += 1,
                }
            }
            true
        })
    }

    pub fn can_go_back(&self) -> bool {
        self.tx.borrow().can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.tx.borrow().can_go_forward()
    }

    /// Open an empty variations drawer for `artifact_id` and mark the store loading.
    pub fn begin_variations(&self, artifact_id: &str) -> Result<()> {
        let mut result = Ok(());
        self.update(|state| {
            if state.is_loading {
                result = Err(AisimError::InvalidInput(
                    "a generation is already in progress".into(),
                ));
                return false;
            }
            if state.find_artifact(artifact_id).is_none() {
                result = Err(AisimError::NotFound(format!("artifact {artifact_id}")));
                return false;
            }
            state.variations = Some(VariationSet::new(artifact_id));
            state.is_loading = true;
            true
        });
        result
    }

    /// Append a variation if the open drawer still belongs to `artifact_id`.
    pub fn push_variation(&self, artifact_id: &str, variation: ComponentVariation) -> bool {
        self.update(|state| match state.variations.as_mut() {
            Some(set) if set.artifact_id == artifact_id => {
                set.items.push(variation);
                true
            }
            _ => false,
        })
    }

    /// Close the drawer and discard its variations.
    pub fn close_variations(&self) {
        self.update(|state| state.variations.take().is_some());
    }

    /// Replace the focused artifact with variation `index` of the open drawer.
    ///
    /// This is the one user-initiated replacement allowed on a terminal artifact.
    pub fn apply_variation(&self, index: usize) -> Result<()> {
        let mut result = Ok(());
        self.update(|state| {
            let (Some(session_index), Some(artifact_index)) =
                (state.current_session, state.focused_artifact)
            else {
                result = Err(AisimError::InvalidInput("no artifact is focused".into()));
                return false;
            };
            let Some(set) = state.variations.as_ref() else {
                result = Err(AisimError::NotFound("no variations are open".into()));
                return false;
            };
            let Some(variation) = set.items.get(index) else {
                result = Err(AisimError::NotFound(format!("variation index {index}")));
                return false;
            };
            let html = variation.html.clone();
            let owner = set.artifact_id.clone();
            let Some(artifact) = state
                .sessions
                .get_mut(session_index)
                .and_then(|s| s.artifacts.get_mut(artifact_index))
            else {
                result = Err(AisimError::NotFound("focused artifact".into()));
                return false;
            };
            if artifact.id != owner {
                result = Err(AisimError::InvalidInput(
                    "variations belong to a different artifact".into(),
                ));
                return false;
            }
            artifact.html = html;
            artifact.status = ArtifactStatus::Complete;
            state.variations = None;
            true
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PLACEHOLDER_STYLE_NAME;

    fn started() -> (SessionStore, Session) {
        let store = SessionStore::new();
        let session = store.start_session("glass clock").unwrap();
        (store, session)
    }

    #[test]
    fn test_start_session_selects_and_loads() {
        let (store, session) = started();
        let snap = store.snapshot();
        assert_eq!(snap.sessions.len(), 1);
        assert_eq!(snap.current_session, Some(0));
        assert_eq!(snap.focused_artifact, None);
        assert!(snap.is_loading);
        assert_eq!(snap.current().unwrap().id, session.id);
        assert_eq!(snap.version, 1);
    }

    #[test]
    fn test_start_session_rejects_blank_and_concurrent() {
        let store = SessionStore::new();
        assert!(matches!(store.start_session("  "), Err(AisimError::InvalidInput(_))));
        store.start_session("one").unwrap();
        assert!(store.start_session("two").is_err());
        store.finish_loading();
        store.start_session("two").unwrap();
        assert_eq!(store.snapshot().current_session, Some(1));
    }

    #[test]
    fn test_start_session_resets_focus() {
        let (store, _) = started();
        store.focus(2).unwrap();
        store.finish_loading();
        store.start_session("again").unwrap();
        assert_eq!(store.snapshot().focused_artifact, None);
    }

    #[test]
    fn test_publish_html_and_complete() {
        let (store, session) = started();
        let id = &session.artifacts[1].id;
        assert!(store.publish_html(id, "<di"));
        assert!(store.publish_html(id, "<div>"));
        assert!(!store.publish_html(id, "<div>"), "unchanged html is not a change");
        assert!(store.complete_artifact(id, "<div></div>".into()));

        let snap = store.snapshot();
        let artifact = snap.find_artifact(id).unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Complete);
        assert_eq!(artifact.html, "<div></div>");
    }

    #[test]
    fn test_terminal_artifact_never_mutates() {
        let (store, session) = started();
        let done = &session.artifacts[0].id;
        let failed = &session.artifacts[1].id;
        store.complete_artifact(done, "<p>ok</p>".into());
        store.fail_artifact(failed, "quota");
        let before = store.snapshot();

        assert!(!store.publish_html(done, "<p>ok</p><p>more"));
        assert!(!store.complete_artifact(done, "other".into()));
        assert!(!store.fail_artifact(done, "late"));
        assert!(!store.set_style_name(done, "AiSim Late"));
        assert!(!store.publish_html(failed, "x"));
        assert!(!store.complete_artifact(failed, "x".into()));

        let after = store.snapshot();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unknown_artifact_writes_ignored() {
        let (store, _) = started();
        let version = store.snapshot().version;
        assert!(!store.publish_html("stale_0", "x"));
        assert!(!store.complete_artifact("stale_0", "x".into()));
        assert!(!store.fail_artifact("stale_0", "x"));
        assert_eq!(store.snapshot().version, version);
    }

    #[test]
    fn test_fail_artifact_replaces_html_with_notice() {
        let (store, session) = started();
        let id = &session.artifacts[2].id;
        store.publish_html(id, "<div>partial");
        assert!(store.fail_artifact(id, "stream reset"));
        let snap = store.snapshot();
        let artifact = snap.find_artifact(id).unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Error);
        assert_eq!(artifact.html, error_notice("stream reset"));
    }

    #[test]
    fn test_set_style_names_brands_in_order() {
        let (store, session) = started();
        let ids: Vec<String> = session.artifacts.iter().map(|a| a.id.clone()).collect();
        let names = vec!["Frosted".to_string(), "AiSim Ink".to_string(), "Wire".to_string()];
        assert_eq!(store.set_style_names(&ids, &names), 3);
        let snap = store.snapshot();
        let styles: Vec<&str> = snap.sessions[0]
            .artifacts
            .iter()
            .map(|a| a.style_name.as_str())
            .collect();
        assert_eq!(styles, vec!["AiSim Frosted", "AiSim Ink", "AiSim Wire"]);
        assert_ne!(styles[0], PLACEHOLDER_STYLE_NAME);
    }

    #[test]
    fn test_navigation_in_focus_mode() {
        let (store, _) = started();
        store.focus(0).unwrap();
        assert!(!store.can_go_back());
        assert!(store.navigate(Direction::Forward));
        assert!(store.navigate(Direction::Forward));
        assert_eq!(store.snapshot().focused_artifact, Some(2));
        assert!(!store.can_go_forward());
        assert!(!store.navigate(Direction::Forward));
        assert!(store.navigate(Direction::Back));
        assert_eq!(store.snapshot().focused_artifact, Some(1));
    }

    #[test]
    fn test_navigation_in_grid_mode_moves_sessions() {
        let (store, _) = started();
        store.finish_loading();
        store.start_session("second").unwrap();
        store.finish_loading();

        assert!(store.can_go_back());
        assert!(!store.can_go_forward());
        assert!(store.navigate(Direction::Back));
        assert_eq!(store.snapshot().current_session, Some(0));
        assert!(!store.navigate(Direction::Back));
        assert!(store.can_go_forward());
    }

    #[test]
    fn test_navigation_empty_store() {
        let store = SessionStore::new();
        assert!(!store.can_go_back());
        assert!(!store.can_go_forward());
        assert!(!store.navigate(Direction::Forward));
        assert!(store.focus(0).is_err());
    }

    #[test]
    fn test_focus_bounds_and_select_session() {
        let (store, _) = started();
        assert!(matches!(store.focus(3), Err(AisimError::InvalidInput(_))));
        store.focus(1).unwrap();
        store.unfocus();
        assert_eq!(store.snapshot().focused_artifact, None);
        store.focus(1).unwrap();
        store.select_session(0).unwrap();
        assert_eq!(store.snapshot().focused_artifact, None);
        assert!(matches!(store.select_session(5), Err(AisimError::NotFound(_))));
    }

    #[test]
    fn test_variations_drawer_lifecycle() {
        let (store, session) = started();
        store.finish_loading();
        let target = session.artifacts[0].id.clone();
        let other = session.artifacts[1].id.clone();

        store.begin_variations(&target).unwrap();
        assert!(store.snapshot().is_loading);
        let v = ComponentVariation {
            name: "AiSim Foo".into(),
            html: "<div></div>".into(),
        };
        assert!(store.push_variation(&target, v.clone()));
        assert!(!store.push_variation(&other, v.clone()), "drawer belongs to another artifact");

        store.close_variations();
        assert!(store.snapshot().variations.is_none());
        assert!(!store.push_variation(&target, v), "closed drawer accepts nothing");
    }

    #[test]
    fn test_begin_variations_rejected_while_loading() {
        let (store, session) = started();
        let result = store.begin_variations(&session.artifacts[0].id);
        assert!(matches!(result, Err(AisimError::InvalidInput(_))));
        store.finish_loading();
        assert!(matches!(
            store.begin_variations("missing_0"),
            Err(AisimError::NotFound(_))
        ));
    }

    #[test]
    fn test_apply_variation_replaces_focused_artifact() {
        let (store, session) = started();
        let id = session.artifacts[1].id.clone();
        store.fail_artifact(&id, "boom");
        store.finish_loading();
        store.focus(1).unwrap();
        store.begin_variations(&id).unwrap();
        store.push_variation(
            &id,
            ComponentVariation {
                name: "AiSim Bar".into(),
                html: "<p>bar</p>".into(),
            },
        );
        store.finish_loading();

        assert!(store.apply_variation(4).is_err());
        store.apply_variation(0).unwrap();
        let snap = store.snapshot();
        let artifact = snap.find_artifact(&id).unwrap();
        assert_eq!(artifact.html, "<p>bar</p>");
        assert_eq!(artifact.status, ArtifactStatus::Complete);
        assert!(snap.variations.is_none());
    }

    #[test]
    fn test_apply_variation_requires_matching_focus() {
        let (store, session) = started();
        store.finish_loading();
        store.begin_variations(&session.artifacts[0].id).unwrap();
        store.push_variation(
            &session.artifacts[0].id,
            ComponentVariation {
                name: "AiSim Bar".into(),
                html: "<p>bar</p>".into(),
            },
        );
        assert!(store.apply_variation(0).is_err(), "nothing focused");
        store.focus(2).unwrap();
        assert!(store.apply_variation(0).is_err(), "focused a different artifact");
    }

    #[tokio::test]
    async fn test_subscriber_sees_final_value() {
        let (store, session) = started();
        let mut rx = store.subscribe();
        let id = session.artifacts[0].id.clone();
        for n in 1..=50 {
            store.publish_html(&id, &"x".repeat(n));
        }
        store.complete_artifact(&id, "done".into());

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.find_artifact(&id).unwrap().html, "done");
        assert_eq!(snap.version, store.snapshot().version);
    }
}
