#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use farmchain_api::metrics::TradeMetrics;
use farmchain_api::middleware::{Claims, ResiliencyState};
use farmchain_api::state::{AppState, AuthConfig};
use farmchain_catalog::{CatalogItem, MemoryCatalog, ProductCatalog, StockLevel};
use farmchain_core::{MemoryUserDirectory, Role, SystemClock, User};
use farmchain_order::{MemoryOrderRepository, OrderCoordinator, SimulatedLedger, TradeSettings};

pub const SECRET: &str = "test-secret";
pub const BUYER: &str = "retailer-7";
pub const SELLER: &str = "farmer-3";
pub const ADMIN: &str = "ops-1";
pub const STRANGER: &str = "distributor-9";

pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub ledger: Arc<SimulatedLedger>,
    pub repo: Arc<MemoryOrderRepository>,
    pub item_id: Uuid,
}

pub async fn test_app(breaker_threshold: usize) -> TestApp {
    let catalog = Arc::new(MemoryCatalog::new());
    let item_id = Uuid::new_v4();
    catalog
        .insert(CatalogItem {
            id: item_id,
            owner_id: SELLER.to_string(),
            owner_address: "0xseller".to_string(),
            name: "Alphonso Mangoes".to_string(),
            category: "fruits".to_string(),
            grade: None,
            images: vec![],
            unit: "crate".to_string(),
            price_per_unit: 1_500,
            currency: "INR".to_string(),
            is_active: true,
            stock: StockLevel { available: 40, sold: 0 },
        })
        .await;

    let users = Arc::new(MemoryUserDirectory::new());
    for (id, role) in [
        (BUYER, Role::Retailer),
        (SELLER, Role::Farmer),
        (ADMIN, Role::Admin),
        (STRANGER, Role::Distributor),
    ] {
        users
            .insert(User {
                id: id.to_string(),
                settlement_address: format!("0x{}", id),
                role,
            })
            .await;
    }

    let ledger = Arc::new(SimulatedLedger::new());
    let repo = Arc::new(MemoryOrderRepository::new());
    let coordinator = OrderCoordinator::new(
        repo.clone(),
        catalog.clone(),
        users,
        ledger.clone(),
        Arc::new(SystemClock),
        TradeSettings::default(),
    );

    let state = AppState {
        coordinator,
        rate_limit: None,
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
        metrics: TradeMetrics::new().unwrap(),
        resiliency: Arc::new(ResiliencyState::new(breaker_threshold, Duration::from_secs(60))),
    };

    TestApp {
        state,
        catalog,
        ledger,
        repo,
        item_id,
    }
}

pub fn token(user_id: &str, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn buyer_token() -> String {
    token(BUYER, Role::Retailer)
}

pub fn seller_token() -> String {
    token(SELLER, Role::Farmer)
}

pub fn admin_token() -> String {
    token(ADMIN, Role::Admin)
}

pub fn stranger_token() -> String {
    token(STRANGER, Role::Distributor)
}

impl TestApp {
    pub fn router(&self) -> Router {
        farmchain_api::app(self.state.clone())
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn create_order(&self, quantity: u32) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/v1/orders",
                Some(&buyer_token()),
                Some(serde_json::json!({
                    "item_id": self.item_id,
                    "quantity": quantity,
                    "delivery_address": {
                        "street": "Plot 4, APMC Yard",
                        "city": "Pune",
                        "state": "MH",
                        "zip_code": "411037"
                    }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn available(&self) -> u64 {
        self.catalog.get_item(self.item_id).await.unwrap().unwrap().stock.available
    }
}
