use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use farmchain_core::{Caller, TradeResult};
use farmchain_order::{
    CreateOrderRequest, ListOrders, Order, OrderPage, OrderStats, OrderStatus, PaymentDetails,
    ShipmentDetails, TransitionRequest,
};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub location: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

impl From<TransitionBody> for TransitionRequest {
    fn from(body: TransitionBody) -> Self {
        let shipment = if body.carrier.is_some() || body.tracking_number.is_some() {
            Some(ShipmentDetails {
                carrier: body.carrier,
                tracking_number: body.tracking_number,
            })
        } else {
            None
        };
        TransitionRequest {
            target: body.status,
            note: body.note,
            location: body.location,
            shipment,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub resolution: String,
    pub refund_buyer: bool,
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
    pub rating: u8,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EscrowCreatedResponse {
    pub escrow_id: Option<String>,
    pub transaction_ref: Option<String>,
    pub order: Order,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/stats", get(order_stats))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/transition", post(transition_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/escrow", get(payment_details))
        .route("/v1/orders/{id}/escrow/create", post(create_escrow))
        .route("/v1/orders/{id}/escrow/release", post(release_escrow))
        .route("/v1/orders/{id}/escrow/cancel", post(cancel_within_grace))
        .route("/v1/orders/{id}/escrow/refund", post(request_refund))
        .route("/v1/orders/{id}/dispute/raise", post(raise_dispute))
        .route("/v1/orders/{id}/dispute/review", post(review_dispute))
        .route("/v1/orders/{id}/dispute/resolve", post(resolve_dispute))
        .route("/v1/orders/{id}/rate", post(rate_order))
}

/// Count the result and turn it into a response.
fn respond(state: &AppState, operation: &str, result: TradeResult<Order>) -> Result<Json<Order>, AppError> {
    state.metrics.observe(operation, &result);
    Ok(Json(result?))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let result = state.coordinator.create_order(&caller, req).await;
    let order = respond(&state, "create_order", result)?;
    Ok((StatusCode::CREATED, order))
}

/// GET /v1/orders?role=purchases|sales&status=&page=&limit=
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListOrders>,
) -> Result<Json<OrderPage>, AppError> {
    Ok(Json(state.coordinator.list_orders(&caller, query).await?))
}

/// GET /v1/orders/stats
pub async fn order_stats(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OrderStats>, AppError> {
    Ok(Json(state.coordinator.stats(&caller).await?))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.get_order(&caller, &order_id).await?))
}

/// POST /v1/orders/{id}/transition
pub async fn transition_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Order>, AppError> {
    let result = state
        .coordinator
        .transition(&caller, &order_id, body.into())
        .await;
    respond(&state, "transition", result)
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Order>, AppError> {
    let result = state.coordinator.cancel(&caller, &order_id, body.reason).await;
    respond(&state, "cancel", result)
}

/// GET /v1/orders/{id}/escrow
pub async fn payment_details(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentDetails>, AppError> {
    Ok(Json(state.coordinator.payment_details(&caller, &order_id).await?))
}

/// POST /v1/orders/{id}/escrow/create
pub async fn create_escrow(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<EscrowCreatedResponse>), AppError> {
    let result = state.coordinator.create_escrow(&caller, &order_id).await;
    let Json(order) = respond(&state, "escrow_create", result)?;
    Ok((
        StatusCode::CREATED,
        Json(EscrowCreatedResponse {
            escrow_id: order.payment.escrow_id.clone(),
            transaction_ref: order.payment.transaction_ref.clone(),
            order,
        }),
    ))
}

/// POST /v1/orders/{id}/escrow/release
pub async fn release_escrow(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let result = state.coordinator.release_escrow(&caller, &order_id).await;
    respond(&state, "escrow_release", result)
}

/// POST /v1/orders/{id}/escrow/cancel
pub async fn cancel_within_grace(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Order>, AppError> {
    let result = state
        .coordinator
        .cancel_escrow_within_grace(&caller, &order_id, body.reason)
        .await;
    respond(&state, "escrow_cancel", result)
}

/// POST /v1/orders/{id}/escrow/refund
pub async fn request_refund(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Order>, AppError> {
    let reason = body.reason.unwrap_or_default();
    let result = state
        .coordinator
        .request_refund(&caller, &order_id, &reason)
        .await;
    respond(&state, "escrow_refund", result)
}

/// POST /v1/orders/{id}/dispute/raise
pub async fn raise_dispute(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Order>, AppError> {
    let reason = body.reason.unwrap_or_default();
    let result = state
        .coordinator
        .raise_dispute(&caller, &order_id, &reason)
        .await;
    respond(&state, "dispute_raise", result)
}

/// POST /v1/orders/{id}/dispute/review
pub async fn review_dispute(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let result = state.coordinator.review_dispute(&caller, &order_id).await;
    respond(&state, "dispute_review", result)
}

/// POST /v1/orders/{id}/dispute/resolve
pub async fn resolve_dispute(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<Order>, AppError> {
    let result = state
        .coordinator
        .resolve_dispute(&caller, &order_id, &body.resolution, body.refund_buyer)
        .await;
    respond(&state, "dispute_resolve", result)
}

/// POST /v1/orders/{id}/rate
pub async fn rate_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(body): Json<RateBody>,
) -> Result<Json<Order>, AppError> {
    let result = state
        .coordinator
        .rate(&caller, &order_id, body.rating, body.review)
        .await;
    respond(&state, "rate", result)
}
