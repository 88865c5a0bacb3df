use rand::seq::SliceRandom;

use crate::error::{AisimError, Result};
use crate::extract::json_array_span;
use crate::llm::{GenerateOptions, TextModel};
use crate::prompts::{INITIAL_PLACEHOLDERS, PLACEHOLDER_PROMPT};

pub fn initial_placeholders() -> Vec<String> {
    INITIAL_PLACEHOLDERS.iter().map(|s| s.to_string()).collect()
}

/// Built-in prompt ideas plus up to `count` fresh ones from the model.
///
/// Never fails: any problem returns just the built-in list.
pub async fn fetch_placeholders(model: &dyn TextModel, count: usize) -> Vec<String> {
    let mut placeholders = initial_placeholders();
    match fetch_ideas(model).await {
        Ok(mut ideas) => {
            ideas.shuffle(&mut rand::thread_rng());
            ideas.truncate(count);
            tracing::debug!(added = ideas.len(), "dynamic placeholders fetched");
            placeholders.extend(ideas);
        }
        Err(e) => tracing::warn!(error = %e, "failed to fetch dynamic placeholders"),
    }
    placeholders
}

async fn fetch_ideas(model: &dyn TextModel) -> Result<Vec<String>> {
    let reply = model
        .generate(PLACEHOLDER_PROMPT, &GenerateOptions::default())
        .await?;
    let span = json_array_span(&reply)
        .ok_or_else(|| AisimError::Llm("placeholder reply contained no JSON array".into()))?;
    let ideas: Vec<String> = serde_json::from_str(span)?;
    let ideas: Vec<String> = ideas
        .into_iter()
        .map(|idea| idea.trim().to_string())
        .filter(|idea| !idea.is_empty())
        .collect();
    if ideas.is_empty() {
        return Err(AisimError::Llm("placeholder reply was empty".into()));
    }
    Ok(ideas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    #[tokio::test]
    async fn test_appends_shuffled_subset() {
        let ideas: Vec<String> = (0..20).map(|i| format!("idea {i}")).collect();
        let reply = format!("```json\n{}\n```", serde_json::to_string(&ideas).unwrap());
        let model = ScriptedModel::new().with_reply("UI component prompts", reply);

        let out = fetch_placeholders(&model, 10).await;
        assert_eq!(out.len(), INITIAL_PLACEHOLDERS.len() + 10);
        assert_eq!(&out[..INITIAL_PLACEHOLDERS.len()], &initial_placeholders()[..]);
        assert!(out[INITIAL_PLACEHOLDERS.len()..]
            .iter()
            .all(|p| p.starts_with("idea ")));
    }

    #[tokio::test]
    async fn test_count_larger_than_reply() {
        let model = ScriptedModel::new().with_reply("UI component prompts", r#"["a", " ", "b"]"#);
        let out = fetch_placeholders(&model, 10).await;
        assert_eq!(out.len(), INITIAL_PLACEHOLDERS.len() + 2);
    }

    #[tokio::test]
    async fn test_failures_fall_back_silently() {
        for model in [
            ScriptedModel::new(),
            ScriptedModel::new().with_reply("UI component prompts", "sorry, no"),
            ScriptedModel::new().with_reply("UI component prompts", "[]"),
            ScriptedModel::new().with_reply("UI component prompts", "[1, 2]"),
        ] {
            assert_eq!(fetch_placeholders(&model, 10).await, initial_placeholders());
        }
    }
}
