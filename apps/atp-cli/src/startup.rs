use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use atp_core::config::{resolve_with_base, Settings};
use atp_search::SearchPipeline;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG`-driven subscriber, `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Load the embedder, open the index and load the reranker. Relative paths
/// resolve against `base`. Any failure here is fatal for the process.
pub fn build_pipeline(settings: &Settings, base: &Path) -> Result<SearchPipeline> {
    let models = &settings.models;
    let embedder_dir = resolve_with_base(base, &models.embedder_dir);
    let reranker_dir = resolve_with_base(base, &models.reranker_dir);

    let embedder = atp_models::get_default_embedder(&embedder_dir, models.max_len)
        .context("loading sentence embedder")?;
    let index = atp_index::open_index(settings, base, embedder).context("opening vector index")?;
    let reranker = atp_models::load_reranker(&reranker_dir, models.max_len, models.batch_size)
        .context("loading cross-encoder")?;

    tracing::info!(
        backend = ?settings.index.backend,
        collection = %settings.index.collection,
        max_results = settings.search.max_results,
        max_rerank_results = settings.search.max_rerank_results,
        "search pipeline ready"
    );
    Ok(SearchPipeline::new(index, Arc::from(reranker), settings.search.clone()))
}
