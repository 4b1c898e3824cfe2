use std::error::Error;
use std::fs;
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use recipe_value_scanner::infra::config::{load_recipe_groups, QueryLibrary, ScannerConfig};
use recipe_value_scanner::infra::store::ItemStore;
use recipe_value_scanner::infra::trade_api::TradeApiClient;
use recipe_value_scanner::report::LogReportSink;
use recipe_value_scanner::scanner::RefreshOrchestrator;

const CONFIG_FILE: &str = "scanner.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ScannerConfig::load_or_default(Path::new(CONFIG_FILE))?;

    let api = TradeApiClient::with_base_url(&config.api_base_url)?;

    // Resolved once per run and threaded through every call from here on.
    let league = api.current_league().await?;
    info!(league = %league, "scanning the current league");

    let database_path = config.database_path();
    if let Some(parent) = database_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let store = ItemStore::open(&database_path)?;
    info!(path = %database_path.display(), cached = store.len()?, "valuation cache opened");

    let queries = QueryLibrary::new(config.queries_dir.clone());
    let recipe_groups = load_recipe_groups(&config.recipes_file)?;
    info!(
        queries = queries.query_names()?.len(),
        recipe_groups = recipe_groups.len(),
        "configuration loaded"
    );

    RefreshOrchestrator::new(
        api,
        queries,
        recipe_groups,
        store,
        config,
        league,
        LogReportSink,
    )
    .run()
    .await;

    Ok(())
}
