#![allow(dead_code)]

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use farmchain_catalog::{CatalogItem, MemoryCatalog, ProductCatalog, StockLevel};
use farmchain_core::{Caller, ManualClock, MemoryUserDirectory, Role, User};
use farmchain_order::{
    CreateOrderRequest, DeliveryAddress, MemoryOrderRepository, Order, OrderCoordinator,
    OrderStatus, PaymentMethod, SimulatedLedger, TradeSettings, TransitionRequest,
};

pub const BUYER: &str = "retailer-7";
pub const SELLER: &str = "farmer-3";
pub const ADMIN: &str = "ops-1";
pub const STRANGER: &str = "distributor-9";

pub fn buyer() -> Caller {
    Caller::new(BUYER, Role::Retailer)
}

pub fn seller() -> Caller {
    Caller::new(SELLER, Role::Farmer)
}

pub fn admin() -> Caller {
    Caller::new(ADMIN, Role::Admin)
}

pub fn stranger() -> Caller {
    Caller::new(STRANGER, Role::Distributor)
}

pub struct Harness {
    pub coordinator: OrderCoordinator,
    pub catalog: Arc<MemoryCatalog>,
    pub ledger: Arc<SimulatedLedger>,
    pub clock: Arc<ManualClock>,
    pub repo: Arc<MemoryOrderRepository>,
    pub item_id: Uuid,
}

pub async fn harness(available: u64, price: i64) -> Harness {
    harness_with_ledger(available, price, SimulatedLedger::new()).await
}

pub async fn harness_with_ledger(available: u64, price: i64, ledger: SimulatedLedger) -> Harness {
    let catalog = Arc::new(MemoryCatalog::new());
    let item_id = Uuid::new_v4();
    catalog
        .insert(CatalogItem {
            id: item_id,
            owner_id: SELLER.to_string(),
            owner_address: "0xseller".to_string(),
            name: "Organic Onions".to_string(),
            category: "vegetables".to_string(),
            grade: Some("A".to_string()),
            images: vec!["ipfs://onions".to_string()],
            unit: "kg".to_string(),
            price_per_unit: price,
            currency: "INR".to_string(),
            is_active: true,
            stock: StockLevel { available, sold: 0 },
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

    let ledger = Arc::new(ledger);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let repo = Arc::new(MemoryOrderRepository::new());
    let coordinator = OrderCoordinator::new(
        repo.clone(),
        catalog.clone(),
        users,
        ledger.clone(),
        clock.clone(),
        TradeSettings::default(),
    );

    Harness {
        coordinator,
        catalog,
        ledger,
        clock,
        repo,
        item_id,
    }
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        street: "22 Wholesale Market".to_string(),
        city: "Nashik".to_string(),
        state: "MH".to_string(),
        zip_code: "422001".to_string(),
        country: "India".to_string(),
    }
}

impl Harness {
    pub fn order_request(&self, quantity: u32) -> CreateOrderRequest {
        CreateOrderRequest {
            item_id: self.item_id,
            quantity,
            delivery_address: address(),
            payment_method: PaymentMethod::Escrow,
            notes: None,
        }
    }

    pub async fn create(&self, quantity: u32) -> Order {
        self.coordinator
            .create_order(&buyer(), self.order_request(quantity))
            .await
            .unwrap()
    }

    pub async fn stock(&self) -> StockLevel {
        self.catalog.get_item(self.item_id).await.unwrap().unwrap().stock
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.coordinator.get_order(&admin(), order_id).await.unwrap()
    }

    /// Walk the order through `targets` as the seller
    pub async fn advance(&self, order_id: &str, targets: &[OrderStatus]) -> Order {
        let mut last = None;
        for target in targets {
            last = Some(
                self.coordinator
                    .transition(&seller(), order_id, TransitionRequest::to(*target))
                    .await
                    .unwrap(),
            );
        }
        last.unwrap()
    }

    /// Create, escrow and deliver an order of `quantity`
    pub async fn delivered_order(&self, quantity: u32) -> Order {
        let order = self.create(quantity).await;
        self.advance(&order.id, &[OrderStatus::Confirmed]).await;
        self.coordinator
            .create_escrow(&buyer(), &order.id)
            .await
            .unwrap();
        self.advance(
            &order.id,
            &[
                OrderStatus::PaymentCompleted,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::InTransit,
                OrderStatus::Delivered,
            ],
        )
        .await
    }
}
