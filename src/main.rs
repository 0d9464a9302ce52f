use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use autoquery::config::EngineConfig;
use autoquery::exec::HttpExecutorPool;
use autoquery::metadata::FileMetadataStore;
use autoquery::reasoner::HttpReasoner;
use autoquery::render::SummaryRenderer;
use autoquery::web::{start_server, AppState};
use autoquery::workflow::Coordinator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::load()?;
    tracing::info!(
        reasoner = %config.reasoner.base_url,
        executor = %config.executor.base_url,
        "starting analytics engine"
    );

    let coordinator = Coordinator::new(
        Arc::new(HttpReasoner::new(
            config.reasoner.base_url.clone(),
            config.reasoner.model.clone(),
        )),
        Arc::new(FileMetadataStore::new(config.metadata.storage_path.clone())),
        Arc::new(HttpExecutorPool::new(
            config.executor.base_url.clone(),
            config.limits.max_result_rows,
        )),
        Arc::new(SummaryRenderer),
        config.retry.max_attempts,
        config.limits.sample_rows,
    );

    let state = AppState {
        coordinator: Arc::new(coordinator),
    };
    start_server(state, &config.server.host, config.server.port).await
}
