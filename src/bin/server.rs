//! RAG server binary
//!
//! Run with: cargo run --bin corpdoc-rag-server

use std::path::Path;

use corpdoc_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpdoc_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional config file, default everything otherwise
    let config = match std::env::var("CORPDOC_RAG_CONFIG") {
        Ok(path) => RagConfig::from_file(Path::new(&path))?,
        Err(_) => RagConfig::default(),
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - Generation model: {}", config.llm.generate_model);
    tracing::info!("  - Chunking strategy: {:?}", config.chunking.strategy);
    tracing::info!("  - Storage: {}", config.vector_db.storage_path.display());

    // Check Ollama up front so a missing backend is visible immediately
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/api/tags", config.llm.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Ollama is running");
        }
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!("Start it with: ollama serve");
            tracing::warn!(
                "Then pull models: ollama pull {} && ollama pull {}",
                config.llm.embed_model,
                config.llm.generate_model
            );
        }
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/rag/upload  - Upload documents");
    println!("  POST /api/rag/query   - Ask questions");
    println!("  GET  /api/rag/stats   - Knowledge base stats");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
