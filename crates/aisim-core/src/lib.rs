pub mod brand;
pub mod config;
pub mod error;
pub mod extract;
pub mod generator;
pub mod llm;
pub mod model;
pub mod placeholders;
pub mod prompts;
pub mod retry;
pub mod store;
pub mod tracking;
pub mod variations;
