use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use server_stats::{
    Target,
    actors::{PollSettings, PollStatusBoard, PollerContext, Supervisor},
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    query::SlpClient,
    storage::{Stores, memory::MemoryBackend, sqlite::SqliteBackend},
    util::resolve_api_settings,
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("server_stats", LevelFilter::TRACE),
        ("stats_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
        ("sqlx", LevelFilter::WARN),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)
        .with_context(|| format!("failed to load config from {}", args.file))?;

    let (stores, sqlite) = open_storage(&config).await?;

    seed_targets(&config, &stores).await?;

    let status = Arc::new(PollStatusBoard::new());
    let supervisor = Arc::new(Supervisor::new(PollerContext {
        client: Arc::new(SlpClient::from_config(&config.query)),
        stores: stores.clone(),
        status,
        settings: PollSettings::from_config(&config.polling),
    }));

    start_pollers(&supervisor, &stores).await?;

    let api_settings = resolve_api_settings(config.api.clone());
    let state = ApiState::new(supervisor.clone(), api_settings.min_request_players);
    let addr = spawn_api_server(ApiConfig::from(&api_settings), state).await?;
    info!("stats hub ready, API on {addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    supervisor.shutdown().await;

    if let Some(sqlite) = sqlite {
        sqlite.close().await;
    }

    Ok(())
}

/// Open the configured backend; the SQLite handle is returned for closing
async fn open_storage(config: &Config) -> anyhow::Result<(Stores, Option<Arc<SqliteBackend>>)> {
    match config.storage.clone().unwrap_or_default() {
        StorageConfig::None => {
            warn!("using in-memory storage, nothing will be persisted");
            Ok((Stores::from_backend(Arc::new(MemoryBackend::new())), None))
        }
        StorageConfig::Sqlite { path } => {
            info!("opening SQLite database at {}", path.display());
            let backend = Arc::new(SqliteBackend::new(&path).await?);
            Ok((Stores::from_backend(backend.clone()), Some(backend)))
        }
    }
}

/// Store configured targets that are not known yet
async fn seed_targets(config: &Config, stores: &Stores) -> anyhow::Result<()> {
    let Some(targets) = &config.targets else {
        return Ok(());
    };

    for configured in targets {
        let target = Target::new(configured.name.as_str(), configured.address.as_str());
        if stores.state.get(&target.id()).await?.is_some() {
            debug!("'{}' is already stored", target.name);
            continue;
        }

        info!("adding '{}' ({}) from config", target.name, target.address);
        stores.state.upsert(&target).await?;
    }

    Ok(())
}

/// Start one poller per stored target
async fn start_pollers(supervisor: &Supervisor, stores: &Stores) -> anyhow::Result<()> {
    let targets = stores.state.list().await?;
    info!("starting pollers for {} server(s)", targets.len());

    for target in targets {
        if let Err(e) = supervisor.add_target(target).await {
            error!("{e}");
        }
    }

    Ok(())
}
