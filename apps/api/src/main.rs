mod cli;
mod config;
mod embedding;
mod errors;
mod jobs;
mod ranking;
mod recommend;
mod records;
mod routes;
mod state;
mod storage;
mod training;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command, SubmitTarget};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::embedding::generator::generate_embeddings;
use crate::jobs::{submit_processing, submit_training, SageMakerJobService};
use crate::recommend::{recommend, ArtifactSet};
use crate::records::merge::merge_training_corpora;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::build_store;
use crate::training::{train_from_store, TrainingOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = build_store(&config).await;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await?,
        Command::IngestMerge => {
            for outcome in merge_training_corpora(store.as_ref()).await? {
                info!(
                    "{} -> {}: {} parts, {} records, written={}",
                    outcome.source_prefix,
                    outcome.dest_key,
                    outcome.parts,
                    outcome.records,
                    outcome.written
                );
            }
        }
        Command::Embed => {
            let embedder = create_embedder(&config)?;
            let report = generate_embeddings(store.as_ref(), embedder.as_ref()).await?;
            info!(
                embedder = %report.embedder,
                dimension = report.dimension,
                "Embeddings written for {} users and {} jobs",
                report.user_rows,
                report.job_rows
            );
        }
        Command::Train => {
            let options = TrainingOptions::from_config(&config)?;
            let pointer = train_from_store(store.as_ref(), options).await?;
            info!("Training complete: run {} at {}", pointer.run_id, pointer.archive_key);
        }
        Command::Recommend { user_id, top_k } => {
            let set = ArtifactSet::load(store.as_ref()).await?;
            let k = top_k.unwrap_or(config.top_k).max(1);
            let result = recommend(&set, &user_id, k)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Submit { job } => {
            let compute = SageMakerJobService::from_config(&config).await;
            let submitted = match job {
                SubmitTarget::Processing => submit_processing(&compute, &config).await?,
                SubmitTarget::Training => submit_training(&compute, &config).await?,
            };
            println!("{}", serde_json::to_string_pretty(&submitted)?);
        }
    }

    Ok(())
}

async fn serve(config: Config, store: Arc<dyn storage::BlobStore>) -> Result<()> {
    info!("Starting jobrec API v{}", env!("CARGO_PKG_VERSION"));

    let compute = Arc::new(SageMakerJobService::from_config(&config).await);
    info!("SageMaker client initialized (region: {})", config.aws_region);

    let state = AppState {
        store,
        compute,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
