mod error;
mod routes;

use std::sync::Arc;

use aisim_core::config::AisimConfig;
use aisim_core::generator::ArtifactGenerator;
use aisim_core::llm::{LlmService, TextModel};
use aisim_core::store::SessionStore;
use aisim_core::tracking::Tracker;
use aisim_core::variations::VariationPipeline;
use anyhow::Result;

pub struct AppState {
    pub store: SessionStore,
    pub config: AisimConfig,
    pub tracker: Tracker,
    /// `None` when no provider credential resolved; generation routes answer 503.
    pub model: Option<Arc<dyn TextModel>>,
}

impl AppState {
    pub fn new(config: AisimConfig, model: Option<Arc<dyn TextModel>>, tracker: Tracker) -> Self {
        Self {
            store: SessionStore::new(),
            config,
            tracker,
            model,
        }
    }

    pub fn generator(&self) -> Option<ArtifactGenerator> {
        let model = self.model.clone()?;
        Some(
            ArtifactGenerator::new(model, self.store.clone(), &self.config.generation)
                .with_tracker(self.tracker.clone()),
        )
    }

    pub fn variations(&self) -> Option<VariationPipeline> {
        let model = self.model.clone()?;
        Some(VariationPipeline::new(
            model,
            self.store.clone(),
            &self.config.generation,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aisim_web=info,aisim_core=info")),
        )
        .init();

    let cwd = std::env::current_dir().ok();
    let config = AisimConfig::load(cwd.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        AisimConfig::default()
    });

    let model: Option<Arc<dyn TextModel>> = match LlmService::from_config(&config.llm) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            tracing::warn!("generation disabled: {e}");
            None
        }
    };

    let tracker = Tracker::new(&config.tracking);
    let state = Arc::new(AppState::new(config.clone(), model, tracker));

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("aisim-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
