//! plate-gen - Section image generation service
//!
//! Generates one illustration per artifact section through an external image
//! provider, re-hosts each image in durable storage, records it in `plate.db`
//! and streams progress to clients over SSE.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plate_gen::db::DATABASE_FILE;
use plate_gen::services::GenerationOrchestrator;
use plate_gen::AppState;

/// Section image generation service
#[derive(Debug, Parser)]
#[command(name = "plate-gen", version, about)]
struct Args {
    /// Path to plate.toml
    #[arg(long, env = "PLATE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides bind_address from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Data folder holding plate.db and local media
    #[arg(long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = plate_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting plate-gen (Section Image Generation) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let root_folder =
        plate_common::config::resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let db_path = root_folder.join(DATABASE_FILE);
    info!("Database: {}", db_path.display());
    let db_pool = plate_gen::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let provider = plate_gen::config::build_image_provider(&config)?;
    let configured_store = plate_gen::config::build_object_store(&config, &root_folder)?;
    let settings = plate_gen::config::orchestrator_settings(&config)?;
    info!(
        section_delay_ms = settings.section_delay.as_millis() as u64,
        size = settings.size.as_str(),
        quality = settings.quality.as_str(),
        "Generation policy"
    );

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        db_pool.clone(),
        provider,
        configured_store.store,
        settings,
    ));

    let state = AppState::new(db_pool, orchestrator).with_media_root(configured_store.media_root);
    let app = plate_gen::build_router(state);

    let bind_address = args
        .bind
        .unwrap_or_else(|| config.bind_address().to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
