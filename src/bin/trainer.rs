use anyhow::{Context, Result};
use clap::Parser;
use clickrank::services::catalog::CatalogStore;
use clickrank::{init_tracing, AppState, Config, Interaction, Item};
use serde::Deserialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train and commit a ClickRank model", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON file with `items` and `interactions` to ingest before training.
    #[arg(short, long)]
    seed_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    interactions: Vec<Interaction>,
}

async fn ingest_seed(state: &AppState, path: &str) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path))?;
    let seed: Seed = serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path))?;

    let item_count = seed.items.len();
    for item in seed.items {
        state.catalog.upsert_item(item).await?;
    }

    let interaction_count = seed.interactions.len();
    for interaction in seed.interactions {
        state.interaction_recorder.record(interaction).await?;
    }

    info!("Seeded {} items and {} interactions from {}", item_count, interaction_count, path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting ClickRank trainer");

    let config = Config::load(&args.config)?;
    info!("Training configuration loaded: {:?}", config.training);

    let state = AppState::new(config)?;

    if let Some(seed_file) = &args.seed_file {
        ingest_seed(&state, seed_file).await?;
    }

    let model = state.training_service.train_and_commit().await?;
    info!("Committed model version {}", model.version);

    println!("{}", serde_json::to_string_pretty(&model.metadata)?);
    Ok(())
}
