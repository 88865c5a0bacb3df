use std::sync::Arc;

use futures::StreamExt;

use crate::config::GenerationConfig;
use crate::error::{AisimError, Result};
use crate::extract::extract_objects;
use crate::llm::{GenerateOptions, TextModel};
use crate::model::ComponentVariation;
use crate::prompts;
use crate::store::SessionStore;

/// Which artifact an open drawer belongs to, and the prompt it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationTarget {
    pub prompt: String,
    pub artifact_id: String,
}

/// Streams alternative designs for one artifact into the variations drawer.
#[derive(Clone)]
pub struct VariationPipeline {
    model: Arc<dyn TextModel>,
    store: SessionStore,
    temperature: f32,
}

impl VariationPipeline {
    pub fn new(model: Arc<dyn TextModel>, store: SessionStore, settings: &GenerationConfig) -> Self {
        Self {
            model,
            store,
            temperature: settings.variation_temperature,
        }
    }

    /// Open the drawer for the focused artifact of the current session.
    ///
    /// Marks the store loading; pair with [`VariationPipeline::fill`].
    pub fn open_focused(&self) -> Result<VariationTarget> {
        let snapshot = self.store.snapshot();
        let session = snapshot
            .current()
            .ok_or_else(|| AisimError::NotFound("no current session".into()))?;
        let artifact = snapshot
            .focused()
            .ok_or_else(|| AisimError::InvalidInput("no artifact is focused".into()))?;
        self.store.begin_variations(&artifact.id)?;
        Ok(VariationTarget {
            prompt: session.prompt.clone(),
            artifact_id: artifact.id.clone(),
        })
    }

    /// Generate variations for the focused artifact of the current session.
    pub async fn run_focused(&self) -> Result<Vec<ComponentVariation>> {
        let target = self.open_focused()?;
        self.fill(&target).await
    }

    /// Open the drawer for `artifact_id` and fill it from one streamed response.
    pub async fn run(&self, prompt: &str, artifact_id: &str) -> Result<Vec<ComponentVariation>> {
        self.store.begin_variations(artifact_id)?;
        self.fill(&VariationTarget {
            prompt: prompt.to_string(),
            artifact_id: artifact_id.to_string(),
        })
        .await
    }

    /// Stream into an already open drawer, then clear loading.
    ///
    /// Returns the variations that landed in the drawer. Objects missing a
    /// name or html are skipped. A stream error ends the run but keeps what
    /// already arrived.
    pub async fn fill(&self, target: &VariationTarget) -> Result<Vec<ComponentVariation>> {
        let result = self
            .stream_into_drawer(&target.prompt, &target.artifact_id)
            .await;
        self.store.finish_loading();
        match &result {
            Ok(items) => tracing::info!(
                artifact_id = %target.artifact_id,
                count = items.len(),
                "variations finished"
            ),
            Err(e) => tracing::error!(artifact_id = %target.artifact_id, error = %e, "variations failed"),
        }
        result
    }

    async fn stream_into_drawer(
        &self,
        prompt: &str,
        artifact_id: &str,
    ) -> Result<Vec<ComponentVariation>> {
        let request = prompts::variations_prompt(prompt);
        let options = GenerateOptions::with_temperature(self.temperature);
        let chunks = self.model.generate_stream(&request, &options).await?;
        let mut objects = std::pin::pin!(extract_objects(chunks));

        let mut accepted = Vec::new();
        while let Some(value) = objects.next().await {
            let value = value?;
            let Some(variation) = ComponentVariation::from_value(&value) else {
                tracing::debug!(%value, "skipping object without name and html");
                continue;
            };
            if !self.store.push_variation(artifact_id, variation.clone()) {
                tracing::debug!(artifact_id, "variations drawer closed, stopping");
                break;
            }
            accepted.push(variation);
        }
        Ok(accepted)
    }
}
