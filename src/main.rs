// src/main.rs

use anyhow::Result;
use semindex::{IndexEngine, IndexOptions, IndexerConfig};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <root> [query]", args[0]);
        eprintln!("  SEMINDEX_CONFIG=<file> selects a config file");
        return Ok(());
    }

    let root = PathBuf::from(&args[1]);
    let query = args.get(2).cloned();

    // ========== CONFIG ==========
    let config_path = env::var_os("SEMINDEX_CONFIG").map(PathBuf::from);
    let config = IndexerConfig::load(config_path.as_deref())?;
    tracing::info!("Database: {}", config.db_path.display());
    tracing::info!("Root: {}", root.display());

    // ========== ENGINE ==========
    let engine = IndexEngine::open(config).await?;

    // ========== INITIAL SCAN ==========
    let report = engine
        .index_repository(&root, IndexOptions { prune_missing: true, ..Default::default() })
        .await?;
    println!(
        "Indexed {} of {} files ({} unchanged, {} failed, {} removed) in {}ms",
        report.indexed_files, report.total_files, report.skipped_files,
        report.failed_files, report.removed_files, report.duration_ms
    );

    let stats = engine.get_index_stats().await?;
    println!("{} files, {} chunks, {} bytes indexed", stats.files, stats.chunks, stats.total_size);

    // ========== QUERY ==========
    if let Some(query) = query {
        let results = engine.search_similar(&query, None).await?;
        for (rank, result) in results.iter().enumerate() {
            println!(
                "{:>2}. {:.4}  {}:{}-{}{}",
                rank + 1,
                result.score,
                result.path,
                result.start_line,
                result.end_line,
                if result.embedding_state == semindex::EmbeddingState::Fallback { "  (fallback)" } else { "" }
            );
        }
    }

    // ========== WATCH ==========
    engine
        .start_file_watching(
            &root,
            Some(Arc::new(|event: &semindex::FileEvent| {
                tracing::info!("Updated: {:?}", event);
            })),
        )
        .await?;
    tracing::info!("Watching for changes. Press Ctrl-C to exit.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    engine.close().await?;
    Ok(())
}
