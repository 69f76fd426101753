use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use farmchain_catalog::{InventoryLedger, ProductCatalog};
use farmchain_core::{Caller, Clock, SettlementLedger, TradeError, TradeResult, UserDirectory};
use farmchain_shared::{Masked, OrderEvent, OrderEventKind};

use crate::dispute::DisputeResolver;
use crate::escrow::{EscrowGateway, PaymentDetails};
use crate::finance::{FinancialManager, OrderStats};
use crate::machine::{ensure_unclaimed, OrderStateMachine, StockEffect, TransitionRequest};
use crate::models::{
    DeliveryAddress, NewOrder, Order, OrderStatus, Party, PaymentMethod, PendingSettlement, Rating,
};
use crate::repository::{OrderQuery, OrderRepository, OrderStore};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct TradeSettings {
    pub escrow_grace_period: Duration,
    pub expected_delivery_days: i64,
    pub platform_fee_bps: u32,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            escrow_grace_period: Duration::hours(1),
            expected_delivery_days: 7,
            platform_fee_bps: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub item_id: Uuid,
    pub quantity: u32,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Purchases,
    Sales,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOrders {
    pub role: Option<PartyRole>,
    pub status: Option<OrderStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// Public surface of the trade core: validation, authorization and the
/// sequencing of order, inventory and escrow changes.
#[derive(Clone)]
pub struct OrderCoordinator {
    store: OrderStore,
    inventory: InventoryLedger,
    users: Arc<dyn UserDirectory>,
    gateway: EscrowGateway,
    disputes: DisputeResolver,
    finance: Arc<FinancialManager>,
    clock: Arc<dyn Clock>,
    settings: TradeSettings,
}

impl OrderCoordinator {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn SettlementLedger>,
        clock: Arc<dyn Clock>,
        settings: TradeSettings,
    ) -> Self {
        let store = OrderStore::new(repo);
        let gateway = EscrowGateway::new(
            ledger,
            store.clone(),
            clock.clone(),
            settings.escrow_grace_period,
        );
        let disputes = DisputeResolver::new(store.clone(), gateway.clone(), clock.clone());
        Self {
            store,
            inventory: InventoryLedger::new(catalog),
            users,
            gateway,
            disputes,
            finance: Arc::new(FinancialManager::new(settings.platform_fee_bps)),
            clock,
            settings,
        }
    }

    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        self.store.repository()
    }

    pub fn settings(&self) -> &TradeSettings {
        &self.settings
    }

    /// Reserve stock and open a `pending` order for the caller.
    pub async fn create_order(&self, caller: &Caller, request: CreateOrderRequest) -> TradeResult<Order> {
        if request.quantity == 0 {
            return Err(TradeError::Validation("quantity must be greater than zero".to_string()));
        }
        request.delivery_address.validate()?;

        let item = self
            .inventory
            .catalog()
            .get_item(request.item_id)
            .await?
            .ok_or_else(|| TradeError::NotFound(format!("catalog item {}", request.item_id)))?;
        if !item.is_active {
            return Err(TradeError::Validation("item is not available for trade".to_string()));
        }
        if item.owner_id == caller.user_id {
            return Err(TradeError::Forbidden("sellers cannot order their own items".to_string()));
        }
        let buyer = self
            .users
            .get_user(&caller.user_id)
            .await?
            .ok_or_else(|| TradeError::NotFound(format!("user {}", caller.user_id)))?;

        let now = self.clock.now();
        let order = Order::new(
            NewOrder {
                buyer: Party {
                    user_id: buyer.id,
                    settlement_address: Masked(buyer.settlement_address),
                },
                seller: Party {
                    user_id: item.owner_id.clone(),
                    settlement_address: Masked(item.owner_address.clone()),
                },
                snapshot: item.snapshot(),
                quantity: request.quantity,
                unit: item.unit.clone(),
                price_per_unit: item.price_per_unit,
                currency: item.currency.clone(),
                delivery_address: request.delivery_address,
                expected_delivery: now + Duration::days(self.settings.expected_delivery_days),
                payment_method: request.payment_method,
                notes: request.notes,
            },
            now,
        )?;

        self.inventory.reserve(item.id, request.quantity).await?;

        let created = OrderEvent::new(
            &order.id,
            OrderEventKind::OrderCreated {
                buyer_id: order.buyer.user_id.clone(),
                seller_id: order.seller.user_id.clone(),
                item_id: order.item_id,
                quantity: order.terms.quantity,
                total_amount: order.terms.total_amount,
                currency: order.terms.currency.clone(),
            },
        );
        if let Err(err) = self.store.repository().insert_order(&order, &[created]).await {
            error!(order_id = %order.id, error = %err, "Order insert failed; returning reservation");
            if let Err(restore_err) = self.inventory.restore(item.id, request.quantity).await {
                error!(item_id = %item.id, error = %restore_err, "Failed to return reservation");
            }
            return Err(err);
        }

        info!(
            order_id = %order.id,
            buyer = %order.buyer.user_id,
            seller = %order.seller.user_id,
            seller_address = %order.seller.settlement_address,
            item_id = %order.item_id,
            quantity = order.terms.quantity,
            total_amount = order.terms.total_amount,
            "Order created"
        );
        Ok(order)
    }

    pub async fn get_order(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        let order = self.store.load(order_id).await?;
        if !order.can_view(caller) {
            return Err(TradeError::Forbidden("not a party to this order".to_string()));
        }
        Ok(order)
    }

    pub async fn list_orders(&self, caller: &Caller, request: ListOrders) -> TradeResult<OrderPage> {
        let limit = request.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = request.page.unwrap_or(1).max(1);
        let mut query = OrderQuery {
            status: request.status,
            offset: (page - 1) * limit,
            limit: Some(limit + 1),
            ..OrderQuery::default()
        };
        match request.role {
            Some(PartyRole::Purchases) => query.buyer_id = Some(caller.user_id.clone()),
            Some(PartyRole::Sales) => query.seller_id = Some(caller.user_id.clone()),
            None => query.party_id = Some(caller.user_id.clone()),
        }

        let mut orders = self.store.repository().list_orders(&query).await?;
        let has_more = orders.len() > limit;
        orders.truncate(limit);
        Ok(OrderPage {
            orders,
            page,
            limit,
            has_more,
        })
    }

    pub async fn stats(&self, caller: &Caller) -> TradeResult<OrderStats> {
        let query = OrderQuery {
            party_id: Some(caller.user_id.clone()),
            ..OrderQuery::default()
        };
        let orders = self.store.repository().list_orders(&query).await?;
        Ok(self.finance.summarize(&caller.user_id, &orders))
    }

    /// Move an order along the lifecycle.
    ///
    /// `disputed` is routed to the dispute workflow (the note is the reason),
    /// a buyer's `cancelled` to [`Self::cancel`], and a seller's `cancelled`
    /// with funds in escrow to a ledger refund first.
    pub async fn transition(
        &self,
        caller: &Caller,
        order_id: &str,
        request: TransitionRequest,
    ) -> TradeResult<Order> {
        match request.target {
            OrderStatus::Disputed => {
                let reason = request.note.as_deref().unwrap_or_default();
                return self.disputes.raise(caller, order_id, reason).await;
            }
            OrderStatus::Cancelled => {
                let current = self.store.load(order_id).await?;
                if current.is_buyer(&caller.user_id) && !caller.is_admin() {
                    return self.cancel(caller, order_id, request.note).await;
                }
                if current.payment.funds_held()
                    || current.pending_settlement == Some(PendingSettlement::Refund)
                {
                    let (order, effect) = self
                        .gateway
                        .refund_and_cancel(caller, order_id, request.note)
                        .await?;
                    self.apply_stock_effect(&order, effect).await;
                    return Ok(order);
                }
            }
            _ => {}
        }

        let now = self.clock.now();
        let result = self
            .store
            .mutate(order_id, |order| {
                ensure_unclaimed(order)?;
                let outcome = OrderStateMachine::transition(order, caller, &request, now)?;
                Ok((outcome.effect, outcome.events))
            })
            .await;
        let (order, effect) = match result {
            Ok(done) => done,
            Err(err) => {
                warn!(order_id, actor = %caller.user_id, target = %request.target, error = %err, "Transition rejected");
                return Err(err);
            }
        };

        info!(order_id, actor = %caller.user_id, status = %order.status, "Order status updated");
        self.apply_stock_effect(&order, effect).await;
        Ok(order)
    }

    /// Buyer withdrawal. With funds in escrow this is a grace-window cancel.
    pub async fn cancel(
        &self,
        caller: &Caller,
        order_id: &str,
        reason: Option<String>,
    ) -> TradeResult<Order> {
        let current = self.store.load(order_id).await?;
        if !current.is_buyer(&caller.user_id) {
            return Err(TradeError::Forbidden("only the buyer can cancel an order".to_string()));
        }
        if !current.status.is_buyer_cancellable() {
            return Err(TradeError::invalid_transition(current.status, OrderStatus::Cancelled));
        }
        if current.payment.funds_held()
            || current.pending_settlement == Some(PendingSettlement::CancelWithinGrace)
        {
            return self.cancel_escrow_within_grace(caller, order_id, reason).await;
        }

        let now = self.clock.now();
        let request = TransitionRequest::to(OrderStatus::Cancelled)
            .with_note(reason.unwrap_or_else(|| "Cancelled by buyer".to_string()));
        let (order, effect) = self
            .store
            .mutate(order_id, |order| {
                ensure_unclaimed(order)?;
                let outcome = OrderStateMachine::transition(order, caller, &request, now)?;
                Ok((outcome.effect, outcome.events))
            })
            .await?;

        info!(order_id, "Order cancelled by buyer");
        self.apply_stock_effect(&order, effect).await;
        Ok(order)
    }

    pub async fn create_escrow(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        self.gateway.create_escrow(caller, order_id).await
    }

    pub async fn release_escrow(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        self.gateway.release(caller, order_id).await
    }

    pub async fn cancel_escrow_within_grace(
        &self,
        caller: &Caller,
        order_id: &str,
        reason: Option<String>,
    ) -> TradeResult<Order> {
        let (order, effect) = self
            .gateway
            .cancel_within_grace(caller, order_id, reason)
            .await?;
        self.apply_stock_effect(&order, effect).await;
        Ok(order)
    }

    pub async fn request_refund(&self, caller: &Caller, order_id: &str, reason: &str) -> TradeResult<Order> {
        self.gateway.request_refund(caller, order_id, reason).await
    }

    pub async fn payment_details(&self, caller: &Caller, order_id: &str) -> TradeResult<PaymentDetails> {
        self.gateway.payment_details(caller, order_id).await
    }

    pub async fn raise_dispute(&self, caller: &Caller, order_id: &str, reason: &str) -> TradeResult<Order> {
        self.disputes.raise(caller, order_id, reason).await
    }

    pub async fn review_dispute(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        self.disputes.review(caller, order_id).await
    }

    pub async fn resolve_dispute(
        &self,
        caller: &Caller,
        order_id: &str,
        resolution: &str,
        refund_buyer: bool,
    ) -> TradeResult<Order> {
        self.disputes
            .resolve(caller, order_id, resolution, refund_buyer)
            .await
    }

    /// One rating per party, only on delivered orders.
    pub async fn rate(
        &self,
        caller: &Caller,
        order_id: &str,
        rating: u8,
        review: Option<String>,
    ) -> TradeResult<Order> {
        if !(1..=5).contains(&rating) {
            return Err(TradeError::Validation("rating must be between 1 and 5".to_string()));
        }
        let now = self.clock.now();
        let (order, ()) = self
            .store
            .mutate(order_id, |order| {
                let rated_user = if order.is_buyer(&caller.user_id) {
                    order.seller.user_id.clone()
                } else if order.is_seller(&caller.user_id) {
                    order.buyer.user_id.clone()
                } else {
                    return Err(TradeError::Forbidden(
                        "only the buyer or seller can rate an order".to_string(),
                    ));
                };
                if order.status != OrderStatus::Delivered {
                    return Err(TradeError::InvalidState(
                        "only delivered orders can be rated".to_string(),
                    ));
                }
                let slot = if order.is_buyer(&caller.user_id) {
                    &mut order.ratings.buyer_rating
                } else {
                    &mut order.ratings.seller_rating
                };
                if slot.is_some() {
                    return Err(TradeError::InvalidState("rating already submitted".to_string()));
                }
                *slot = Some(Rating {
                    rating,
                    review: review.unwrap_or_default(),
                    rated_at: now,
                });
                order.updated_at = now;
                let event = OrderEvent::new(
                    &order.id,
                    OrderEventKind::RatingSubmitted {
                        rated_by: caller.user_id.clone(),
                        rated_user,
                        rating,
                    },
                );
                Ok(((), vec![event]))
            })
            .await?;
        info!(order_id, rated_by = %caller.user_id, rating, "Rating submitted");
        Ok(order)
    }

    /// Inventory follow-up for a committed status change. The order is
    /// already saved with its reservation flag, so a failure here is logged
    /// for reconciliation rather than returned.
    async fn apply_stock_effect(&self, order: &Order, effect: StockEffect) {
        let result = match effect {
            StockEffect::None => return,
            StockEffect::Restore => self.inventory.restore(order.item_id, order.terms.quantity).await,
            StockEffect::MarkSold => {
                self.inventory
                    .mark_sold(order.item_id, order.terms.quantity)
                    .await
            }
        };
        if let Err(err) = result {
            error!(
                order_id = %order.id,
                item_id = %order.item_id,
                quantity = order.terms.quantity,
                ?effect,
                error = %err,
                "Inventory update failed after order commit"
            );
        }
    }
}
