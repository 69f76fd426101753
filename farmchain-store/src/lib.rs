pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod ledger_client;
pub mod order_repo;
pub mod redis_repo;
pub mod user_repo;

pub use app_config::Config;
pub use catalog_repo::PgCatalog;
pub use database::DbClient;
pub use events::{EventPublisher, LogPublisher, PublishError};
#[cfg(feature = "kafka")]
pub use events::KafkaPublisher;
pub use ledger_client::HttpLedgerClient;
pub use order_repo::PgOrderRepository;
pub use redis_repo::RedisClient;
pub use user_repo::PgUserDirectory;
