use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use healthbot::knowledge::KnowledgeBase;
use healthbot::together::TogetherClient;
use healthbot::{run_server, AppConfig, Resolver};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    if config.together_api_key.is_none() {
        tracing::warn!("TOGETHER_API_KEY is not set; online requests will fail");
    }

    let kb = Arc::new(KnowledgeBase::load(&config)?);
    let together = Arc::new(TogetherClient::from_config(&config)?);
    let resolver = Resolver::new(kb, together, config.resolver_options());

    run_server(config, resolver).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
