use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aisim_core::config::{self, AisimConfig};
use aisim_core::generator::ArtifactGenerator;
use aisim_core::llm::{LlmService, ScriptedModel, TextModel};
use aisim_core::model::{ArtifactStatus, ComponentVariation, Session};
use aisim_core::placeholders::fetch_placeholders;
use aisim_core::store::{SessionStore, StoreSnapshot};
use aisim_core::tracking::{build_request_url, BuildRequest, Tracker};
use aisim_core::variations::VariationPipeline;
use anyhow::{bail, Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;

#[derive(Parser)]
#[command(name = "aisim", about = "AISim: streamed UI design generation", version)]
enum Cli {
    /// Generate three design directions for a prompt
    Generate {
        /// What to design, e.g. "a weather card for sailors"
        prompt: String,
        /// Write each completed artifact to DIR/<artifact-id>.html
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Output the final session as JSON
        #[arg(long)]
        json: bool,
        /// Use the built-in scripted model instead of a provider
        #[arg(long)]
        offline: bool,
    },
    /// Generate a session, focus one artifact, and stream variations of it
    Variations {
        prompt: String,
        /// Artifact position to vary (0-2)
        #[arg(short, long, default_value = "0")]
        artifact: usize,
        /// Write each variation to DIR/variation-<n>.html
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Output the variations as JSON
        #[arg(long)]
        json: bool,
        #[arg(long)]
        offline: bool,
    },
    /// List prompt ideas (built-in plus model-suggested)
    Placeholders {
        #[arg(long)]
        offline: bool,
    },
    /// Show resolved configuration and credential status
    Status,
    /// Create a checkout link for a lead and asset
    Checkout {
        #[arg(long)]
        lead: String,
        #[arg(long)]
        asset: String,
    },
    /// Print the contact-form URL for a build request
    BuildUrl {
        /// Contact form base URL
        form: String,
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = AisimConfig::load(Some(&std::env::current_dir()?)).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        AisimConfig::default()
    });

    run(cli, &config).await
}

async fn run(cli: Cli, config: &AisimConfig) -> Result<()> {
    match cli {
        Cli::Generate {
            prompt,
            out,
            json,
            offline,
        } => {
            let model = make_model(config, offline)?;
            cmd_generate(model, config, offline, &prompt, out.as_deref(), json).await
        }
        Cli::Variations {
            prompt,
            artifact,
            out,
            json,
            offline,
        } => {
            let model = make_model(config, offline)?;
            cmd_variations(model, config, &prompt, artifact, out.as_deref(), json).await
        }
        Cli::Placeholders { offline } => {
            let model = make_model(config, offline)?;
            cmd_placeholders(model.as_ref(), config).await
        }
        Cli::Status => cmd_status(config),
        Cli::Checkout { lead, asset } => cmd_checkout(config, &lead, &asset).await,
        Cli::BuildUrl {
            form,
            asset,
            prompt,
            style,
            session,
        } => {
            let request = BuildRequest {
                build_id: None,
                asset_id: asset,
                prompt,
                style_name: style,
                session_id: session,
            };
            println!("{}", build_request_url(&form, &request)?);
            Ok(())
        }
    }
}

/// Resolve the text model up front so a missing credential fails before any work starts.
fn make_model(config: &AisimConfig, offline: bool) -> Result<Arc<dyn TextModel>> {
    if offline {
        return Ok(Arc::new(ScriptedModel::demo()));
    }
    let service = LlmService::from_config(&config.llm).with_context(|| {
        format!(
            "no text model available for provider '{}' (use --offline to try the demo model)",
            config.llm.provider
        )
    })?;
    Ok(Arc::new(service))
}

// -- generate --

async fn cmd_generate(
    model: Arc<dyn TextModel>,
    config: &AisimConfig,
    offline: bool,
    prompt: &str,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let store = SessionStore::new();
    let mut generator = ArtifactGenerator::new(model, store.clone(), &config.generation);
    if !offline {
        generator = generator.with_tracker(Tracker::new(&config.tracking));
    }

    let session = run_session(&generator, prompt, !json).await?;

    if let Some(dir) = out {
        let written = write_artifacts(dir, &session)?;
        if !json {
            for path in &written {
                println!("  {} {}", "Wrote".green(), path.display());
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        print_summary(&session);
    }
    Ok(())
}

/// Start a session, run it in the background, and follow it through the store
/// until loading clears.
async fn run_session(generator: &ArtifactGenerator, prompt: &str, verbose: bool) -> Result<Session> {
    let store = generator.store().clone();
    let mut rx = store.subscribe();
    let session = store.start_session(prompt)?;

    if verbose {
        println!("{} {}", "Designing".bold(), session.prompt.cyan());
    }

    let task = {
        let generator = generator.clone();
        let session = session.clone();
        tokio::spawn(async move { generator.run(&session).await })
    };

    let mut seen: HashMap<String, (String, ArtifactStatus)> = HashMap::new();
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if verbose {
            report_progress(&snapshot, &session.id, &mut seen);
        }
        if !snapshot.is_loading {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
    task.await.context("generation task panicked")?;

    store
        .snapshot()
        .sessions
        .into_iter()
        .find(|s| s.id == session.id)
        .context("session disappeared from the store")
}

fn report_progress(
    snapshot: &StoreSnapshot,
    session_id: &str,
    seen: &mut HashMap<String, (String, ArtifactStatus)>,
) {
    let Some(session) = snapshot.sessions.iter().find(|s| s.id == session_id) else {
        return;
    };
    for (i, artifact) in session.artifacts.iter().enumerate() {
        let current = (artifact.style_name.clone(), artifact.status);
        if seen.get(&artifact.id) == Some(&current) {
            continue;
        }
        let label = format!("[{}]", i + 1);
        match artifact.status {
            ArtifactStatus::Streaming => {
                println!("  {} {} {}", label.dimmed(), artifact.style_name, "streaming".yellow())
            }
            ArtifactStatus::Complete => println!(
                "  {} {} {} ({} bytes)",
                label.dimmed(),
                artifact.style_name,
                "complete".green(),
                artifact.html.len()
            ),
            ArtifactStatus::Error => {
                println!("  {} {} {}", label.dimmed(), artifact.style_name, "error".red())
            }
        }
        seen.insert(artifact.id.clone(), current);
    }
}

fn write_artifacts(dir: &Path, session: &Session) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();
    for artifact in &session.artifacts {
        if artifact.status != ArtifactStatus::Complete {
            continue;
        }
        let path = dir.join(format!("{}.html", artifact.id));
        std::fs::write(&path, &artifact.html)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn print_summary(session: &Session) {
    let complete = session
        .artifacts
        .iter()
        .filter(|a| a.status == ArtifactStatus::Complete)
        .count();
    println!();
    println!(
        "{} {}/{} artifacts complete",
        "Done:".bold(),
        complete,
        session.artifacts.len()
    );
    println!("  {} {}", "Session:".dimmed(), session.id);
    for artifact in &session.artifacts {
        println!("  {} {}", artifact.id.dimmed(), artifact.style_name);
    }
}

// -- variations --

async fn cmd_variations(
    model: Arc<dyn TextModel>,
    config: &AisimConfig,
    prompt: &str,
    artifact: usize,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let store = SessionStore::new();
    let generator = ArtifactGenerator::new(model.clone(), store.clone(), &config.generation);
    let session = run_session(&generator, prompt, !json).await?;

    let Some(base) = session.artifacts.get(artifact) else {
        bail!(
            "artifact {artifact} out of range (session has {})",
            session.artifacts.len()
        );
    };
    if base.status != ArtifactStatus::Complete {
        bail!("artifact {artifact} did not complete; nothing to vary");
    }
    store.focus(artifact)?;

    let pipeline = VariationPipeline::new(model, store.clone(), &config.generation);
    let mut rx = store.subscribe();
    let target = pipeline.open_focused()?;
    if !json {
        println!();
        println!("{} {}", "Varying".bold(), base.style_name.cyan());
    }
    let task = tokio::spawn(async move { pipeline.fill(&target).await });

    let mut printed = 0;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if let Some(set) = &snapshot.variations {
            if !json {
                for (i, variation) in set.items.iter().enumerate().skip(printed) {
                    print_variation(i, variation);
                }
            }
            printed = set.items.len();
        }
        if !snapshot.is_loading {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }

    let variations = match task.await.context("variations task panicked")? {
        Ok(items) => items,
        Err(e) => {
            eprintln!("{} {e}", "Warning:".yellow());
            store
                .snapshot()
                .variations
                .map(|set| set.items)
                .unwrap_or_default()
        }
    };

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (i, variation) in variations.iter().enumerate() {
            let path = dir.join(format!("variation-{}.html", i + 1));
            std::fs::write(&path, &variation.html)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !json {
                println!("  {} {}", "Wrote".green(), path.display());
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&variations)?);
    } else if variations.is_empty() {
        println!("{}", "No variations arrived.".dimmed());
    }
    Ok(())
}

fn print_variation(index: usize, variation: &ComponentVariation) {
    println!(
        "  {} {} {}",
        format!("[{}]", index + 1).dimmed(),
        variation.name.green(),
        format!("({} bytes)", variation.html.len()).dimmed()
    );
}

// -- misc --

async fn cmd_placeholders(model: &dyn TextModel, config: &AisimConfig) -> Result<()> {
    let placeholders = fetch_placeholders(model, config.generation.placeholder_count).await;
    for idea in placeholders {
        println!("  {} {}", "-".dimmed(), idea);
    }
    Ok(())
}

fn cmd_status(config: &AisimConfig) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    println!("{}", format!("AISim Status v{version}").bold());
    println!("  {}   {}", "Provider:".dimmed(), config.llm.provider.cyan());
    println!("  {}      {}", "Model:".dimmed(), config.llm.model);

    match LlmService::from_config(&config.llm) {
        Ok(_) => println!("  {} {}", "Credential:".dimmed(), "resolved".green()),
        Err(e) => println!("  {} {} - {}", "Credential:".dimmed(), "missing".red(), e),
    }

    let tracker = Tracker::new(&config.tracking);
    if tracker.is_configured() {
        println!("  {}   {}", "Tracking:".dimmed(), "configured".green());
    } else {
        println!("  {}   {}", "Tracking:".dimmed(), "off".yellow());
    }

    println!(
        "  {}  {}",
        "Variation temperature:".dimmed(),
        config.generation.variation_temperature
    );
    match config.generation.stream_idle_timeout_secs {
        Some(secs) => println!("  {}  {secs}s", "Stream idle timeout:".dimmed()),
        None => println!("  {}  none", "Stream idle timeout:".dimmed()),
    }
    if let Some(dir) = config::config_dir() {
        println!("  {}     {}", "Config:".dimmed(), dir.join("config.toml").display());
    }
    Ok(())
}

async fn cmd_checkout(config: &AisimConfig, lead: &str, asset: &str) -> Result<()> {
    let tracker = Tracker::new(&config.tracking);
    if !tracker.is_configured() {
        bail!("tracking webhook is not configured; set tracking.webhook_url");
    }
    match tracker.lead_relay().create_checkout(lead, asset).await {
        Some(url) => {
            println!("{url}");
            Ok(())
        }
        None => bail!("checkout link could not be created"),
    }
}
