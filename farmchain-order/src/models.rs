use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use farmchain_catalog::ProductSnapshot;
use farmchain_core::{Caller, TradeError};
use farmchain_shared::Masked;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    PaymentInitiated,
    PaymentCompleted,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
    Disputed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::PaymentInitiated,
        OrderStatus::PaymentCompleted,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Disputed,
    ];

    /// Adjacency table for ordinary transitions. `disputed` leaves only
    /// through dispute resolution, which is not an edge of this table.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[PaymentInitiated, Cancelled],
            PaymentInitiated => &[PaymentCompleted, Cancelled],
            PaymentCompleted => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[InTransit],
            InTransit => &[OutForDelivery, Delivered],
            OutForDelivery => &[Delivered],
            Delivered => &[Disputed],
            Cancelled | Refunded | Disputed => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// States from which the buyer may withdraw unilaterally
    pub fn is_buyer_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::PaymentInitiated
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::PaymentInitiated => "payment_initiated",
            OrderStatus::PaymentCompleted => "payment_completed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Disputed => "disputed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TradeError::Validation(format!("unknown order status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Escrow,
    Crypto,
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
    Closed,
}

/// What has happened to the stock taken when the order was created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Held,
    Restored,
    Sold,
}

/// A ledger operation that has been claimed on this order but whose
/// outcome has not yet been written back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PendingSettlement {
    CreateEscrow,
    Release,
    Refund,
    RequestRefund,
    CancelWithinGrace,
    ResolveDispute { refund_buyer: bool },
}

impl PendingSettlement {
    pub fn name(&self) -> &'static str {
        match self {
            PendingSettlement::CreateEscrow => "create_escrow",
            PendingSettlement::Release => "release",
            PendingSettlement::Refund => "refund",
            PendingSettlement::RequestRefund => "request_refund",
            PendingSettlement::CancelWithinGrace => "cancel_within_grace",
            PendingSettlement::ResolveDispute { .. } => "resolve_dispute",
        }
    }
}

/// One row of the append-only audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub note: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub user_id: String,
    pub settlement_address: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTerms {
    pub quantity: u32,
    pub unit: String,
    pub price_per_unit: i64,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

impl DeliveryAddress {
    pub fn validate(&self) -> Result<(), TradeError> {
        if self.street.trim().is_empty() || self.city.trim().is_empty() {
            return Err(TradeError::Validation(
                "delivery address requires street and city".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub address: DeliveryAddress,
    pub expected_date: DateTime<Utc>,
    pub actual_date: Option<DateTime<Utc>>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub escrow_id: Option<String>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub escrow_created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    fn new(method: PaymentMethod) -> Self {
        Self {
            escrow_id: None,
            method,
            status: PaymentStatus::Pending,
            transaction_ref: None,
            escrow_created_at: None,
            paid_at: None,
            refunded_at: None,
        }
    }

    /// Funds sit in escrow: created on the ledger and neither paid out nor returned.
    pub fn funds_held(&self) -> bool {
        self.escrow_id.is_some() && self.status == PaymentStatus::Pending
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub is_disputed: bool,
    pub reason: Option<String>,
    pub raised_by: Option<String>,
    pub raised_at: Option<DateTime<Utc>>,
    /// `None` until a dispute is raised
    pub status: Option<DisputeStatus>,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub refund_buyer: Option<bool>,
}

impl DisputeRecord {
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.status,
            Some(DisputeStatus::Open) | Some(DisputeStatus::UnderReview)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rating {
    pub rating: u8,
    pub review: String,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ratings {
    /// Given by the buyer, about the seller
    pub buyer_rating: Option<Rating>,
    /// Given by the seller, about the buyer
    pub seller_rating: Option<Rating>,
}

/// The aggregate root for one trade between a buyer and a producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Optimistic concurrency token, bumped on every persisted change
    pub version: u64,
    pub buyer: Party,
    pub seller: Party,
    pub item_id: Uuid,
    pub snapshot: ProductSnapshot,
    pub terms: OrderTerms,
    pub delivery: Delivery,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub payment: PaymentRecord,
    pub dispute: DisputeRecord,
    pub ratings: Ratings,
    pub reservation: ReservationState,
    pub pending_settlement: Option<PendingSettlement>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to open an order; validated by the coordinator.
pub struct NewOrder {
    pub buyer: Party,
    pub seller: Party,
    pub snapshot: ProductSnapshot,
    pub quantity: u32,
    pub unit: String,
    pub price_per_unit: i64,
    pub currency: String,
    pub delivery_address: DeliveryAddress,
    pub expected_delivery: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl Order {
    pub fn new(new: NewOrder, now: DateTime<Utc>) -> Result<Self, TradeError> {
        if new.quantity == 0 {
            return Err(TradeError::Validation("quantity must be greater than zero".to_string()));
        }
        if new.price_per_unit < 0 {
            return Err(TradeError::Validation("price per unit cannot be negative".to_string()));
        }
        let total_amount = new
            .price_per_unit
            .checked_mul(i64::from(new.quantity))
            .ok_or_else(|| TradeError::Validation("order total overflows".to_string()))?;

        let buyer_id = new.buyer.user_id.clone();
        Ok(Self {
            id: generate_order_id(now),
            version: 0,
            item_id: new.snapshot.item_id,
            buyer: new.buyer,
            seller: new.seller,
            snapshot: new.snapshot,
            terms: OrderTerms {
                quantity: new.quantity,
                unit: new.unit,
                price_per_unit: new.price_per_unit,
                total_amount,
                currency: new.currency,
            },
            delivery: Delivery {
                address: new.delivery_address,
                expected_date: new.expected_delivery,
                actual_date: None,
                carrier: None,
                tracking_number: None,
            },
            status: OrderStatus::Pending,
            status_history: vec![StatusChange {
                status: OrderStatus::Pending,
                timestamp: now,
                actor: buyer_id,
                note: "Order created".to_string(),
                location: None,
            }],
            payment: PaymentRecord::new(new.payment_method),
            dispute: DisputeRecord::default(),
            ratings: Ratings::default(),
            reservation: ReservationState::Held,
            pending_settlement: None,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_buyer(&self, user_id: &str) -> bool {
        self.buyer.user_id == user_id
    }

    pub fn is_seller(&self, user_id: &str) -> bool {
        self.seller.user_id == user_id
    }

    pub fn is_party(&self, user_id: &str) -> bool {
        self.is_buyer(user_id) || self.is_seller(user_id)
    }

    pub fn can_view(&self, caller: &Caller) -> bool {
        caller.is_admin() || self.is_party(&caller.user_id)
    }

    pub fn has_reached(&self, status: OrderStatus) -> bool {
        self.status_history.iter().any(|entry| entry.status == status)
    }

    /// Move to `status` and append the matching history row in one step.
    /// Callers are responsible for checking the move is legal.
    pub(crate) fn record_status(
        &mut self,
        status: OrderStatus,
        actor: &str,
        note: impl Into<String>,
        location: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status_history.push(StatusChange {
            status,
            timestamp: now,
            actor: actor.to_string(),
            note: note.into(),
            location,
        });
        self.status = status;
        self.updated_at = now;
    }

    /// Structural invariants every persisted order satisfies.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.terms.quantity == 0 {
            return Err("quantity must be positive".to_string());
        }
        if self.terms.total_amount != self.terms.price_per_unit * i64::from(self.terms.quantity) {
            return Err("total amount does not equal quantity * price per unit".to_string());
        }
        match self.status_history.last() {
            Some(last) if last.status == self.status => {}
            _ => return Err("last history entry does not match current status".to_string()),
        }
        if self.dispute.is_disputed != self.dispute.status.is_some() {
            return Err("dispute flag and dispute status disagree".to_string());
        }
        Ok(())
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `ORD-{unix_millis}-{9 base36 chars}`
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}
