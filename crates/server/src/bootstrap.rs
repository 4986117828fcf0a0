use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use shelfdesk_agent::{conversation, AgentRuntime, OpenAiCompatClient, ToolRegistry};
use shelfdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use shelfdesk_db::repositories::{
    SqlCatalogRepository, SqlConversationRepository, SqlOrderRepository,
};
use shelfdesk_db::{connect_with_settings, migrations, DbPool};

/// Everything the router needs, built once at startup. The agent runtime is
/// constructed here and injected into handlers; there is no ambient global.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client initialization failed: {0}")]
    Llm(#[source] anyhow::Error),
    #[error("system prompt load failed: {0}")]
    SystemPrompt(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let log = Arc::new(SqlConversationRepository::new(db_pool.clone()));

    let llm = OpenAiCompatClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let system_prompt = conversation::load_system_prompt(config.llm.system_prompt_path.as_deref())
        .map_err(BootstrapError::SystemPrompt)?;

    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(llm),
        ToolRegistry::standard(catalog, orders),
        log,
        system_prompt,
        config.llm.max_tool_rounds,
    ));
    info!(model = %config.llm.model, "agent runtime constructed");

    Ok(Application { config, db_pool, runtime })
}
