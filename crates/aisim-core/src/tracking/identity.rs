use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AisimError, Result};

/// Who is generating: a session token plus a stable host fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingIdentity {
    pub session_id: String,
    pub fingerprint: String,
}

impl TrackingIdentity {
    /// Reuse the persisted session if it is younger than `ttl_hours`, else start
    /// and persist a new one. Persistence problems only cost continuity.
    pub(crate) fn resolve(session_path: Option<&Path>, ttl_hours: u64) -> Self {
        let now = Utc::now();
        let stored = session_path
            .and_then(TrackingSession::load)
            .filter(|s| s.is_fresh(ttl_hours, now));

        let session = match stored {
            Some(session) => session,
            None => {
                let session = TrackingSession::start(now);
                if let Some(path) = session_path {
                    if let Err(e) = session.save(path) {
                        tracing::debug!(error = %e, "could not persist tracking session");
                    }
                }
                session
            }
        };

        Self {
            session_id: session.session_id,
            fingerprint: fingerprint(),
        }
    }
}

/// Persisted session token: `~/.config/aisim/tracking_session.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl TrackingSession {
    pub fn default_path() -> Option<PathBuf> {
        crate::config::config_dir().map(|p| p.join("tracking_session.toml"))
    }

    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::now_v7().to_string(),
            created_at: now,
        }
    }

    /// `None` if the file is missing or unparseable.
    pub fn load(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        toml::from_str(&contents).ok()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AisimError::Config(format!("failed to create config dir: {e}")))?;
        }
        let toml_str = toml::to_string_pretty(self).map_err(|e| {
            AisimError::Config(format!("failed to serialize tracking session: {e}"))
        })?;
        std::fs::write(path, toml_str)
            .map_err(|e| AisimError::Config(format!("failed to write tracking session: {e}")))?;
        Ok(())
    }

    pub fn is_fresh(&self, ttl_hours: u64, now: DateTime<Utc>) -> bool {
        // capped at a century to stay inside chrono's range
        let ttl = Duration::hours(ttl_hours.min(876_000) as i64);
        self.created_at > now - ttl
    }
}

/// First 32 hex chars of a SHA-256 over host facts that rarely change.
pub fn fingerprint() -> String {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get().to_string())
        .unwrap_or_else(|_| "unknown".into());
    let offset = chrono::Local::now().offset().local_minus_utc();
    let facts = [
        std::env::consts::OS.to_string(),
        std::env::consts::ARCH.to_string(),
        env_or_unknown(&["HOSTNAME", "COMPUTERNAME"]),
        env_or_unknown(&["USER", "USERNAME"]),
        offset.to_string(),
        cores,
    ];
    hash_facts(&facts)
}

fn env_or_unknown(names: &[&str]) -> String {
    names
        .iter()
        .find_map(|n| std::env::var(n).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".into())
}

fn hash_facts(facts: &[String]) -> String {
    let digest = Sha256::digest(facts.join("|").as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(32);
    hex
}
