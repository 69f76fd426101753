use std::sync::Arc;

use farmchain_order::OrderCoordinator;
use farmchain_store::RedisClient;

use crate::metrics::TradeMetrics;
use crate::middleware::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub requests_per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: OrderCoordinator,
    /// Absent when no Redis is configured; requests are then not limited.
    pub rate_limit: Option<RateLimit>,
    pub auth: AuthConfig,
    pub metrics: TradeMetrics,
    pub resiliency: Arc<ResiliencyState>,
}
