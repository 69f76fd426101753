use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use farmchain_api::{
    app,
    metrics::TradeMetrics,
    middleware::ResiliencyState,
    state::{AppState, AuthConfig, RateLimit},
    worker,
};
use farmchain_catalog::{MemoryCatalog, ProductCatalog};
use farmchain_core::{MemoryUserDirectory, SettlementLedger, SystemClock, UserDirectory};
use farmchain_order::{MemoryOrderRepository, OrderCoordinator, OrderRepository, SimulatedLedger};
use farmchain_store::{
    Config, DbClient, EventPublisher, HttpLedgerClient, LogPublisher, PgCatalog,
    PgOrderRepository, PgUserDirectory, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Backends = (
    Arc<dyn OrderRepository>,
    Arc<dyn ProductCatalog>,
    Arc<dyn UserDirectory>,
);

async fn backends(config: &Config) -> anyhow::Result<Backends> {
    match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections).await?;
            db.migrate().await?;
            let repo: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(db.pool.clone()));
            let catalog: Arc<dyn ProductCatalog> = Arc::new(PgCatalog::new(db.pool.clone()));
            let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(db.pool.clone()));
            Ok((repo, catalog, users))
        }
        None => {
            tracing::warn!("No database configured, using in-memory repositories");
            let repo: Arc<dyn OrderRepository> = Arc::new(MemoryOrderRepository::new());
            let catalog: Arc<dyn ProductCatalog> = Arc::new(MemoryCatalog::new());
            let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
            Ok((repo, catalog, users))
        }
    }
}

fn ledger(config: &Config) -> anyhow::Result<Arc<dyn SettlementLedger>> {
    match &config.ledger.url {
        Some(url) => Ok(Arc::new(HttpLedgerClient::new(
            url,
            Duration::from_millis(config.ledger.timeout_ms),
        )?)),
        None => {
            tracing::warn!("No settlement ledger configured, using the simulated ledger");
            Ok(Arc::new(SimulatedLedger::new()))
        }
    }
}

#[cfg(feature = "kafka")]
fn publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    match &config.kafka.brokers {
        Some(brokers) => Ok(Arc::new(farmchain_store::KafkaPublisher::new(
            brokers,
            &config.kafka.topic,
        )?)),
        None => Ok(Arc::new(LogPublisher)),
    }
}

#[cfg(not(feature = "kafka"))]
fn publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    if config.kafka.brokers.is_some() {
        tracing::warn!("Kafka brokers configured but the kafka feature is disabled; logging events instead");
    }
    Ok(Arc::new(LogPublisher))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmchain_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting FarmChain API on port {}", config.server.port);

    let (repo, catalog, users) = backends(&config).await?;

    let rate_limit = match &config.redis.url {
        Some(url) => Some(RateLimit {
            redis: Arc::new(RedisClient::new(url).await?),
            requests_per_minute: config.redis.requests_per_minute,
        }),
        None => None,
    };

    let coordinator = OrderCoordinator::new(
        repo.clone(),
        catalog,
        users,
        ledger(&config)?,
        Arc::new(SystemClock),
        config.trade.settings(),
    );

    let metrics = TradeMetrics::new()?;

    tokio::spawn(worker::start_outbox_relay(
        repo,
        publisher(&config)?,
        metrics.clone(),
        Duration::from_secs(1),
    ));

    let app_state = AppState {
        coordinator,
        rate_limit,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        metrics,
        resiliency: Arc::new(ResiliencyState::new(5, Duration::from_secs(30))),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
