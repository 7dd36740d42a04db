use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use erpbot_agent::{Bot, BotConfig, BotParts, Collaborators};
use erpbot_infra::audit::{AuditSink, SqlAuditSink};
use erpbot_infra::db::PgQueryExecutor;
use erpbot_infra::erp::SqlErpStore;
use erpbot_infra::http::ReqwestApiClient;
use erpbot_perf::SysinfoHost;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8090";
const DB_POOL_SIZE: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    erpbot_observability::init();

    let config = BotConfig::from_env().context("invalid bot configuration")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let listen_addr = std::env::var("BOT_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

    let db = PgQueryExecutor::connect(&database_url, DB_POOL_SIZE)
        .await
        .context("failed to connect to the ERP database")?;
    let api = ReqwestApiClient::new(config.api_url.clone()).context("invalid BOT_API_URL")?;
    let audit = Arc::new(SqlAuditSink::new(db.clone()));
    if let Err(e) = audit.ensure_schema().await {
        warn!(error = %e, "could not prepare audit tables; writes will retry");
    }

    let parts = BotParts::wire(
        &config,
        Collaborators {
            db: Arc::new(db.clone()),
            api: Arc::new(api),
            store: Arc::new(SqlErpStore::new(db)),
            audit,
            host: Arc::new(SysinfoHost::new()),
        },
    );
    let bot = Bot::new(config, parts);
    bot.start().await;

    let app = erpbot_api::app::build_app(bot.clone());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(addr = %listener.local_addr()?, "control api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler failed");
            }
        })
        .await
        .context("server error")?;

    bot.stop().await;
    info!("shut down");
    Ok(())
}
