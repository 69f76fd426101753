use serde::Deserialize;
use std::env;

use farmchain_order::TradeSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub trade: TradeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the service runs on in-memory repositories.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Rate limiting is disabled when no URL is set.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_requests_per_minute() -> i64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: None,
            topic: default_topic(),
        }
    }
}

fn default_topic() -> String {
    "orders.events".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Settlement ledger endpoint. Without a URL an in-process simulated
/// ledger is used, which is only suitable for development.
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub url: Option<String>,
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_ledger_timeout_ms(),
        }
    }
}

fn default_ledger_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradeConfig {
    #[serde(default = "default_grace_seconds")]
    pub escrow_grace_period_seconds: i64,
    #[serde(default = "default_delivery_days")]
    pub expected_delivery_days: i64,
    #[serde(default = "default_fee_bps")]
    pub platform_fee_bps: u32,
}

fn default_grace_seconds() -> i64 {
    3600
}

fn default_delivery_days() -> i64 {
    7
}

fn default_fee_bps() -> u32 {
    200
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            escrow_grace_period_seconds: default_grace_seconds(),
            expected_delivery_days: default_delivery_days(),
            platform_fee_bps: default_fee_bps(),
        }
    }
}

impl TradeConfig {
    pub fn settings(&self) -> TradeSettings {
        TradeSettings {
            escrow_grace_period: chrono::Duration::seconds(self.escrow_grace_period_seconds),
            expected_delivery_days: self.expected_delivery_days,
            platform_fee_bps: self.platform_fee_bps,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. FARMCHAIN__DATABASE__URL=postgres://...
            .add_source(config::Environment::with_prefix("FARMCHAIN").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
