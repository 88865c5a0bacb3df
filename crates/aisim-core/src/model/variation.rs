use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::brand::ensure_brand_prefix;

/// A complete alternative design produced by the variations stream.
/// Lives only while the variations drawer for its artifact is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVariation {
    pub name: String,
    pub html: String,
}

impl ComponentVariation {
    /// Build a branded variation from one streamed `{name, html}` object.
    ///
    /// Returns `None` when either field is missing, not a string, or blank.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?;
        let html = value.get("html")?.as_str()?;
        if name.trim().is_empty() || html.is_empty() {
            return None;
        }
        Some(Self {
            name: ensure_brand_prefix(name),
            html: html.to_string(),
        })
    }
}

/// The variations drawer: which artifact it was opened for and what has arrived so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationSet {
    pub artifact_id: String,
    pub items: Vec<ComponentVariation>,
}

impl VariationSet {
    pub fn new(artifact_id: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            items: Vec::new(),
        }
    }
}
