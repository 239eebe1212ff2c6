//! End-to-end order flow against a real embedded ledger

mod common;

use common::Harness;
use event_ledger::EventKind;
use order_core::{
    Checkpoint, CommitmentPayload, Direction, Error, OrderRequest, OrderStatus, Verdict,
};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_purchase_ship_deliver_complete() {
    let h = Harness::new().await;

    // Purchase
    let placed = h
        .lifecycle
        .create_order(&h.buyer(), OrderRequest::new(h.item.id.clone(), 1))
        .await
        .unwrap();

    let order_id = placed.order.id.clone();
    let shipment_id = placed.shipment.id.clone();

    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.total_amount, Decimal::from(60));
    assert_eq!(placed.order.seller_id, h.seller.id);
    assert_eq!(placed.shipment.checkpoint, Checkpoint::AwaitingSellerAcceptance);
    assert_eq!(placed.shipment.logistics_id.as_ref(), Some(&h.logistics.id));
    assert_eq!(h.balance(&h.buyer), Decimal::from(40));
    assert_eq!(h.stock(), 2);

    let history = h.ctx.gateway.history(order_id.as_str()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, EventKind::OrderCreated);
    assert_eq!(
        h.ctx.store.order(&order_id).unwrap().ledger_tx_ref,
        Some(history[0].tx_ref)
    );

    // Seller accepts
    let accepted = h
        .lifecycle
        .update_status(&h.seller(), &order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(accepted.status, OrderStatus::Processing);
    assert_eq!(accepted.status_updated_by.as_ref(), Some(&h.seller.id));

    // First checkpoint marks the order shipped
    let shipment = h
        .checkpoints
        .advance_checkpoint(&h.logistics(), &shipment_id, Checkpoint::TransitCenter)
        .await
        .unwrap();
    assert_eq!(shipment.checkpoint, Checkpoint::TransitCenter);
    assert!(shipment.estimated_arrival.is_some());
    assert_eq!(
        h.ctx.store.order(&order_id).unwrap().status,
        OrderStatus::Shipped
    );

    let shipment_history = h.ctx.gateway.history(shipment_id.as_str()).await.unwrap();
    assert_eq!(shipment_history.len(), 1);
    assert_eq!(shipment_history[0].kind, EventKind::StatusUpdate);

    let eta = shipment.estimated_arrival;
    let shipment = h
        .checkpoints
        .advance_checkpoint(&h.logistics(), &shipment_id, Checkpoint::OutForDelivery)
        .await
        .unwrap();
    assert_eq!(shipment.estimated_arrival, eta);

    // Buyer confirms
    let delivered = h
        .lifecycle
        .update_status(&h.buyer(), &order_id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let history = h.ctx.gateway.history(order_id.as_str()).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::OrderCreated,
            EventKind::StatusUpdate,
            EventKind::DeliveryConfirmed
        ]
    );

    h.lifecycle
        .update_status(&h.buyer(), &order_id, OrderStatus::Completed)
        .await
        .unwrap();

    // Every row matches its latest ledger event
    let order_check = h.auditor.verify_order(&order_id).await.unwrap();
    assert_eq!(order_check.verdict, Verdict::Verified);
    let shipment_check = h.auditor.verify_shipment(&shipment_id).await.unwrap();
    assert_eq!(shipment_check.verdict, Verdict::Verified);

    let report = h.auditor.scan_recent().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.matched as u64, h.ledger_len());
}

#[tokio::test]
async fn test_recorded_commitment_matches_final_row() {
    let h = Harness::new().await;
    let placed = h
        .lifecycle
        .create_order(&h.buyer(), OrderRequest::new(h.item.id.clone(), 1))
        .await
        .unwrap();

    let row = h.ctx.store.order(&placed.order.id).unwrap();
    let event = h
        .ctx
        .gateway
        .event(&row.ledger_tx_ref.unwrap())
        .await
        .unwrap();

    let rebuilt = CommitmentPayload::OrderCreated {
        order_id: row.id.clone(),
        amount: row.total_amount,
        buyer_id: row.buyer_id.clone(),
    };
    assert_eq!(rebuilt.commitment(), event.commitment);
    assert_eq!(
        h.ctx.store.receipt(&event.tx_ref).unwrap(),
        Some(placed.receipt)
    );
}

#[tokio::test]
async fn test_cancel_refunds_and_restocks() {
    let h = Harness::new().await;
    let placed = h
        .lifecycle
        .create_order(&h.buyer(), OrderRequest::new(h.item.id.clone(), 1))
        .await
        .unwrap();
    assert_eq!(h.balance(&h.buyer), Decimal::from(40));

    let cancelled = h
        .lifecycle
        .update_status(&h.buyer(), &placed.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.balance(&h.buyer), Decimal::from(100));
    assert_eq!(h.stock(), 3);

    let err = h
        .checkpoints
        .advance_checkpoint(&h.logistics(), &placed.shipment.id, Checkpoint::LogisticsHub)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let verification = h.auditor.verify_order(&placed.order.id).await.unwrap();
    assert_eq!(verification.verdict, Verdict::Verified);
}

#[tokio::test]
async fn test_listing_visibility() {
    let h = Harness::new().await;
    let placed = h
        .lifecycle
        .create_order(&h.buyer(), OrderRequest::new(h.item.id.clone(), 1))
        .await
        .unwrap();

    let other_buyer = h.register("Ravi", order_core::Role::Buyer, 500);
    let other = order_core::Actor::of(&other_buyer);

    assert_eq!(h.lifecycle.orders_for(&h.buyer()).unwrap().len(), 1);
    assert_eq!(h.lifecycle.orders_for(&h.seller()).unwrap().len(), 1);
    assert_eq!(h.lifecycle.orders_for(&h.logistics()).unwrap().len(), 1);
    assert!(h.lifecycle.orders_for(&other).unwrap().is_empty());

    let shipments = h.lifecycle.shipments_for(&h.buyer()).unwrap();
    assert_eq!(shipments.len(), 1);
    assert_eq!(shipments[0].order_id, placed.order.id);
    assert!(h.lifecycle.shipments_for(&other).unwrap().is_empty());

    assert_eq!(h.catalog.items_by_seller(&h.seller.id).unwrap().len(), 1);
    assert_eq!(h.catalog.all_items().unwrap().len(), 1);
}

#[tokio::test]
async fn test_withdrawal_over_balance_rejected() {
    let h = Harness::new().await;

    let err = h
        .wallet
        .adjust_balance(&h.buyer(), &h.buyer.id, Decimal::from(150), Direction::Withdraw)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(h.balance(&h.buyer), Decimal::from(100));

    let user = h
        .wallet
        .adjust_balance(&h.buyer(), &h.buyer.id, Decimal::from(25), Direction::Deposit)
        .await
        .unwrap();
    assert_eq!(user.wallet_balance, Decimal::from(125));

    let user = h
        .wallet
        .adjust_balance(&h.buyer(), &h.buyer.id, Decimal::from(125), Direction::Withdraw)
        .await
        .unwrap();
    assert_eq!(user.wallet_balance, Decimal::ZERO);

    // wallet movements are not ledger events
    assert_eq!(h.ledger_len(), 0);
}

#[tokio::test]
async fn test_wallet_rejects_other_owner_and_non_positive() {
    let h = Harness::new().await;

    let err = h
        .wallet
        .adjust_balance(&h.seller(), &h.buyer.id, Decimal::from(10), Direction::Withdraw)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let err = h
        .wallet
        .adjust_balance(&h.buyer(), &h.buyer.id, Decimal::ZERO, Direction::Deposit)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
