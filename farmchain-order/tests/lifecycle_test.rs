mod common;

use rand::seq::SliceRandom;
use rand::SeedableRng;

use common::*;
use farmchain_core::{ErrorKind, TradeError};
use farmchain_order::{
    ListOrders, OrderRepository, OrderStatus, PartyRole, PaymentStatus, ShipmentDetails,
    TransitionRequest,
};
use farmchain_shared::OrderEventKind;

#[tokio::test]
async fn test_create_snapshots_terms_and_reserves_stock() {
    let h = harness(100, 50).await;

    let order = h.create(10).await;

    assert_eq!(order.terms.total_amount, 500);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.buyer.user_id, BUYER);
    assert_eq!(order.seller.user_id, SELLER);
    assert_eq!(order.seller.settlement_address.inner(), "0xseller");
    assert_eq!(order.snapshot.name, "Organic Onions");
    assert!(order.id.starts_with("ORD-"));
    assert_eq!(
        order.delivery.expected_date,
        order.created_at + chrono::Duration::days(7)
    );
    assert_eq!(h.stock().await.available, 90);

    h.catalog.rename(h.item_id, "Red Onions").await;
    assert_eq!(h.order(&order.id).await.snapshot.name, "Organic Onions");

    let events = h.repo.all_events().await;
    assert!(matches!(
        events[0].kind,
        OrderEventKind::OrderCreated { quantity: 10, total_amount: 500, .. }
    ));
}

#[tokio::test]
async fn test_create_rejections_leave_stock_untouched() {
    let h = harness(5, 50).await;

    let err = h
        .coordinator
        .create_order(&seller(), h.order_request(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .coordinator
        .create_order(&buyer(), h.order_request(6))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TradeError::InsufficientQuantity { requested: 6, available: 5 }
    ));

    let err = h
        .coordinator
        .create_order(&buyer(), h.order_request(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut request = h.order_request(1);
    request.item_id = uuid::Uuid::new_v4();
    let err = h.coordinator.create_order(&buyer(), request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut request = h.order_request(1);
    request.delivery_address.city = String::new();
    let err = h.coordinator.create_order(&buyer(), request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(h.stock().await.available, 5);
}

#[tokio::test]
async fn test_visibility_is_limited_to_parties() {
    let h = harness(10, 50).await;
    let order = h.create(1).await;

    assert!(h.coordinator.get_order(&buyer(), &order.id).await.is_ok());
    assert!(h.coordinator.get_order(&seller(), &order.id).await.is_ok());
    assert!(h.coordinator.get_order(&admin(), &order.id).await.is_ok());
    let err = h
        .coordinator
        .get_order(&stranger(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .coordinator
        .get_order(&buyer(), "ORD-0-missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_happy_path_then_release() {
    let h = harness(100, 50).await;
    let order = h.delivered_order(10).await;

    assert_eq!(order.status, OrderStatus::Delivered);
    assert!(order.delivery.actual_date.is_some());
    let statuses: Vec<OrderStatus> = order.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::PaymentInitiated,
            OrderStatus::PaymentCompleted,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ]
    );
    let stock = h.stock().await;
    assert_eq!(stock.available, 90);
    assert_eq!(stock.sold, 10);

    let released = h
        .coordinator
        .release_escrow(&buyer(), &order.id)
        .await
        .unwrap();
    assert_eq!(released.payment.status, PaymentStatus::Completed);
    assert!(released.payment.paid_at.is_some());
    assert_eq!(released.status, OrderStatus::Delivered);

    let escrow_id = released.payment.escrow_id.clone().unwrap();
    assert_eq!(h.ledger.escrow_state(&escrow_id).await, Some("released"));

    let err = h
        .coordinator
        .release_escrow(&buyer(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert!(released.check_invariants().is_ok());
}

#[tokio::test]
async fn test_release_requires_delivery() {
    let h = harness(100, 50).await;
    let order = h.create(2).await;
    h.advance(&order.id, &[OrderStatus::Confirmed]).await;
    h.coordinator.create_escrow(&buyer(), &order.id).await.unwrap();

    let err = h
        .coordinator
        .release_escrow(&buyer(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let err = h
        .coordinator
        .release_escrow(&seller(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let current = h.order(&order.id).await;
    assert_eq!(current.payment.status, PaymentStatus::Pending);
    assert!(current.pending_settlement.is_none());
}

#[tokio::test]
async fn test_buyer_cancel_before_escrow_restores_stock() {
    let h = harness(40, 50).await;
    let before = h.stock().await.available;
    let order = h.create(15).await;
    h.advance(&order.id, &[OrderStatus::Confirmed]).await;

    let cancelled = h
        .coordinator
        .cancel(&buyer(), &order.id, Some("found a closer supplier".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.status_history.last().unwrap().note,
        "found a closer supplier"
    );
    assert_eq!(h.stock().await.available, before);

    let err = h
        .coordinator
        .cancel(&buyer(), &order.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(h.stock().await.available, before);
}

#[tokio::test]
async fn test_cancel_is_buyer_only_and_early_only() {
    let h = harness(40, 50).await;
    let order = h.create(1).await;

    let err = h
        .coordinator
        .cancel(&seller(), &order.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let shipped = h.delivered_order(1).await;
    let err = h
        .coordinator
        .cancel(&buyer(), &shipped.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_seller_cancel_without_escrow() {
    let h = harness(40, 50).await;
    let order = h.create(4).await;

    let cancelled = h
        .coordinator
        .transition(
            &seller(),
            &order.id,
            TransitionRequest::to(OrderStatus::Cancelled).with_note("out of stock"),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.stock().await.available, 40);
}

#[tokio::test]
async fn test_buyer_transition_to_cancelled_routes_to_cancel() {
    let h = harness(40, 50).await;
    let order = h.create(4).await;

    let cancelled = h
        .coordinator
        .transition(&buyer(), &order.id, TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.stock().await.available, 40);
}

#[tokio::test]
async fn test_shipping_metadata_is_recorded() {
    let h = harness(40, 50).await;
    let order = h.create(1).await;
    h.advance(&order.id, &[OrderStatus::Confirmed]).await;
    h.coordinator.create_escrow(&buyer(), &order.id).await.unwrap();
    h.advance(
        &order.id,
        &[OrderStatus::PaymentCompleted, OrderStatus::Processing],
    )
    .await;

    let shipped = h
        .coordinator
        .transition(
            &seller(),
            &order.id,
            TransitionRequest {
                target: OrderStatus::Shipped,
                note: Some("Dispatched from cold store".to_string()),
                location: Some("Nashik".to_string()),
                shipment: Some(ShipmentDetails {
                    carrier: Some("Delhivery".to_string()),
                    tracking_number: Some("DL-0042".to_string()),
                }),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.delivery.carrier.as_deref(), Some("Delhivery"));
    assert_eq!(shipped.delivery.tracking_number.as_deref(), Some("DL-0042"));
    assert_eq!(
        shipped.status_history.last().unwrap().location.as_deref(),
        Some("Nashik")
    );

    let err = h
        .coordinator
        .transition(&seller(), &order.id, TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_random_walks_only_follow_the_table() {
    let h = harness(10_000, 3).await;
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let order = h.create(1).await;
        for _ in 0..15 {
            let target = *OrderStatus::ALL.choose(&mut rng).unwrap();
            let before = h.order(&order.id).await;
            let result = h
                .coordinator
                .transition(&admin(), &order.id, TransitionRequest::to(target))
                .await;
            let after = h.order(&order.id).await;
            match result {
                Ok(_) => {
                    assert!(
                        before.status.can_transition_to(target),
                        "{} -> {} slipped through",
                        before.status,
                        target
                    );
                    assert_eq!(after.status_history.len(), before.status_history.len() + 1);
                }
                Err(_) => {
                    assert_eq!(after.status, before.status);
                    assert_eq!(after.status_history.len(), before.status_history.len());
                }
            }
            assert!(after.check_invariants().is_ok());
            for pair in after.status_history.windows(2) {
                assert!(pair[0].status.can_transition_to(pair[1].status));
            }
        }
    }
}

#[tokio::test]
async fn test_cancelled_orders_round_trip_stock() {
    let h = harness(500, 7).await;
    let start = h.stock().await.available;

    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let paths: [&[OrderStatus]; 3] = [
        &[],
        &[OrderStatus::Confirmed],
        &[OrderStatus::Confirmed, OrderStatus::PaymentInitiated],
    ];
    for quantity in [3u32, 9, 27, 81] {
        let order = h.create(quantity).await;
        let path = paths.choose(&mut rng).unwrap();
        if !path.is_empty() {
            h.advance(&order.id, path).await;
        }
        h.coordinator.cancel(&buyer(), &order.id, None).await.unwrap();
    }

    assert_eq!(h.stock().await.available, start);
    assert_eq!(h.stock().await.sold, 0);
}

#[tokio::test]
async fn test_ratings_once_per_party_after_delivery() {
    let h = harness(100, 50).await;
    let pending = h.create(1).await;
    let err = h
        .coordinator
        .rate(&buyer(), &pending.id, 5, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let order = h.delivered_order(2).await;
    let err = h
        .coordinator
        .rate(&buyer(), &order.id, 6, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let rated = h
        .coordinator
        .rate(&buyer(), &order.id, 4, Some("crisp and dry".to_string()))
        .await
        .unwrap();
    assert_eq!(rated.ratings.buyer_rating.as_ref().unwrap().rating, 4);

    let err = h
        .coordinator
        .rate(&buyer(), &order.id, 5, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let rated = h.coordinator.rate(&seller(), &order.id, 5, None).await.unwrap();
    assert_eq!(rated.ratings.seller_rating.as_ref().unwrap().rating, 5);

    let err = h
        .coordinator
        .rate(&stranger(), &order.id, 3, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_listing_and_stats() {
    let h = harness(1_000, 50).await;
    let delivered = h.delivered_order(10).await;
    h.coordinator
        .release_escrow(&buyer(), &delivered.id)
        .await
        .unwrap();
    let cancelled = h.create(2).await;
    h.coordinator.cancel(&buyer(), &cancelled.id, None).await.unwrap();
    for _ in 0..3 {
        h.create(1).await;
    }

    let page = h
        .coordinator
        .list_orders(
            &buyer(),
            ListOrders {
                role: Some(PartyRole::Purchases),
                limit: Some(2),
                ..ListOrders::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.orders.len(), 2);
    assert!(page.has_more);
    assert!(page.orders[0].created_at >= page.orders[1].created_at);

    let pending = h
        .coordinator
        .list_orders(
            &seller(),
            ListOrders {
                role: Some(PartyRole::Sales),
                status: Some(OrderStatus::Pending),
                ..ListOrders::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.orders.len(), 3);
    assert!(!pending.has_more);

    let none = h
        .coordinator
        .list_orders(&stranger(), ListOrders::default())
        .await
        .unwrap();
    assert!(none.orders.is_empty());

    let stats = h.coordinator.stats(&seller()).await.unwrap();
    assert_eq!(stats.as_seller["pending"].count, 3);
    assert_eq!(stats.as_seller["cancelled"].total_amount, 100);
    assert_eq!(stats.payments.received, 490);
    assert_eq!(stats.payments.platform_fees, 10);

    let stats = h.coordinator.stats(&buyer()).await.unwrap();
    assert_eq!(stats.payments.sent, 500);
    assert!(stats.as_seller.is_empty());
}

#[tokio::test]
async fn test_outbox_collects_events_until_published() {
    let h = harness(100, 50).await;
    let order = h.create(1).await;
    h.advance(&order.id, &[OrderStatus::Confirmed]).await;

    let repo = h.coordinator.repository();
    let pending = repo.unpublished_events(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].event.name(), "order.created");
    assert_eq!(pending[1].event.name(), "order.status_changed");

    repo.mark_published(&[pending[0].sequence]).await.unwrap();
    let rest = repo.unpublished_events(10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].sequence, pending[1].sequence);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ship_and_cancel_exactly_one_wins() {
    let ledger = farmchain_order::SimulatedLedger::with_latency(std::time::Duration::from_millis(2));
    let h = harness_with_ledger(1_000, 5, ledger).await;
    let mut ids = Vec::new();
    for _ in 0..20 {
        let order = h.create(1).await;
        h.advance(&order.id, &[OrderStatus::Confirmed]).await;
        h.coordinator.create_escrow(&buyer(), &order.id).await.unwrap();
        h.advance(
            &order.id,
            &[OrderStatus::PaymentCompleted, OrderStatus::Processing],
        )
        .await;

        let coordinator = h.coordinator.clone();
        let id = order.id.clone();
        let ship = tokio::spawn(async move {
            coordinator
                .transition(&seller(), &id, TransitionRequest::to(OrderStatus::Shipped))
                .await
        });
        let coordinator = h.coordinator.clone();
        let id = order.id.clone();
        let cancel = tokio::spawn(async move {
            coordinator
                .transition(&seller(), &id, TransitionRequest::to(OrderStatus::Cancelled))
                .await
        });
        let outcomes = [ship.await.unwrap(), cancel.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                err.kind(),
                ErrorKind::InvalidTransition | ErrorKind::Conflict
            ));
        }

        let current = h.order(&order.id).await;
        assert!(current.pending_settlement.is_none());
        match current.status {
            OrderStatus::Shipped => assert_eq!(current.payment.status, PaymentStatus::Pending),
            OrderStatus::Cancelled => assert_eq!(current.payment.status, PaymentStatus::Refunded),
            other => panic!("unexpected status {}", other),
        }
        ids.push(order.id);
    }

    let mut held = 0u64;
    for id in &ids {
        if h.order(id).await.status != OrderStatus::Cancelled {
            held += 1;
        }
    }
    assert_eq!(h.stock().await.available, 1_000 - held);
}
