#![allow(dead_code)]

use aisim_core::config::GenerationConfig;
use aisim_core::llm::ScriptedModel;

pub const STYLES: [&str; 3] = [
    "AiSim Frosted Glass Lattice",
    "AiSim Letterpress Ink Relief",
    "AiSim Neon Wire Circuitry",
];

/// A model whose naming call returns [`STYLES`]; streams are added by the caller.
pub fn named_model() -> ScriptedModel {
    let reply = serde_json::to_string(&STYLES).unwrap_or_default();
    ScriptedModel::new().with_reply("design directions", reply)
}

/// Generation settings with near-zero retry delays.
pub fn fast_settings() -> GenerationConfig {
    GenerationConfig {
        retry_base_delay_ms: 1,
        ..Default::default()
    }
}
