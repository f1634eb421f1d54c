//! Integration tests for the checkout -> order lifecycle across the
//! SQLite-backed stores (spec §8 scenario 2 and scenario 6), independent of
//! the broker/cache binaries under `src/bin/`.
//!
//! These drive `CartStore` + `CheckoutSession::build` + `OrderRepository`
//! together against on-disk SQLite fixtures, the way the teacher's
//! `tests/backtest_run_integration.rs` drives its orchestrator against a
//! fixture SQLite database rather than mocking every layer.

use rust_decimal_macros::dec;
use uuid::Uuid;

use betterbooks_backend::domain::order::{Order, OrderItem, OrderItemStatus, OrderStatus};
use betterbooks_backend::domain::{Address, CheckoutSession, Isbn, Money};
use betterbooks_backend::error::DomainError;
use betterbooks_backend::services::{CartStore, OrderRepository};

fn temp_db_path(label: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "betterbooks-{label}-{}-{}.sqlite",
        std::process::id(),
        Uuid::new_v4()
    ));
    path
}

fn delivery_address() -> Address {
    Address::new("Main St 1", "Aarhus", "8000", None, None).unwrap()
}

/// Scenario 6: adding the same (ISBN, seller) key twice merges quantities
/// into one row and advances `updated_date`, persisted and reloaded through
/// SQLite rather than asserted purely in memory.
#[tokio::test]
async fn cart_merge_persists_across_reloads() {
    let db_path = temp_db_path("cart");
    let store = CartStore::new(db_path.to_str().unwrap()).unwrap();

    let isbn = Isbn::parse("9780123456789").unwrap();
    let mut cart = store.load("cust-1").await.unwrap();
    let first_updated = cart.updated_date;

    cart.add_item(isbn.clone(), "s1", 1, Money::new(dec!(29.99), "DKK").unwrap())
        .unwrap();
    store.save(&cart).await.unwrap();

    let mut reloaded = store.load("cust-1").await.unwrap();
    reloaded
        .add_item(isbn.clone(), "s1", 2, Money::new(dec!(29.99), "DKK").unwrap())
        .unwrap();
    store.save(&reloaded).await.unwrap();

    let final_cart = store.load("cust-1").await.unwrap();
    assert_eq!(final_cart.items.len(), 1);
    let merged = final_cart
        .items
        .values()
        .find(|i| i.isbn == isbn && i.seller_id == "s1")
        .expect("merged row present");
    assert_eq!(merged.quantity, 3);
    assert!(final_cart.updated_date >= first_updated);

    let _ = std::fs::remove_file(&db_path);
}

/// Scenario 2: the literal cart from spec §8 produces the literal session
/// totals, and confirming it at the exact total produces a Paid order whose
/// `seller_ids()` preserves first-appearance order.
#[tokio::test]
async fn scenario_2_checkout_session_and_payment_confirmation() {
    let cart_db = temp_db_path("cart2");
    let order_db = temp_db_path("order2");
    let cart_store = CartStore::new(cart_db.to_str().unwrap()).unwrap();
    let order_repo = OrderRepository::new(order_db.to_str().unwrap()).unwrap();

    let mut cart = cart_store.load("cust-1").await.unwrap();
    cart.add_item(
        Isbn::parse("9780123456789").unwrap(),
        "s1",
        2,
        Money::new(dec!(29.99), "DKK").unwrap(),
    )
    .unwrap();
    cart.add_item(
        Isbn::parse("9780123456790").unwrap(),
        "s1",
        1,
        Money::new(dec!(19.99), "DKK").unwrap(),
    )
    .unwrap();
    cart.add_item(
        Isbn::parse("9780123456791").unwrap(),
        "s2",
        1,
        Money::new(dec!(39.99), "DKK").unwrap(),
    )
    .unwrap();
    cart_store.save(&cart).await.unwrap();

    let loaded = cart_store.load("cust-1").await.unwrap();
    let session = CheckoutSession::build("cust-1", &loaded, delivery_address(), dec!(0.10), 30).unwrap();
    session.check_invariants().unwrap();

    assert_eq!(session.total_amount.amount, dec!(119.96));
    let s1 = session.allocations.iter().find(|a| a.seller_id == "s1").unwrap();
    let s2 = session.allocations.iter().find(|a| a.seller_id == "s2").unwrap();
    assert_eq!(s1.subtotal.amount, dec!(79.97));
    assert_eq!(s1.seller_payout.amount, dec!(71.97));
    assert_eq!(s2.subtotal.amount, dec!(39.99));
    assert_eq!(s2.seller_payout.amount, dec!(35.99));

    let mut order_items = Vec::new();
    for alloc in &session.allocations {
        for item in &alloc.items {
            order_items.push(
                OrderItem::new(item.isbn.clone(), item.seller_id.clone(), item.quantity, item.unit_price.clone())
                    .unwrap(),
            );
        }
    }
    let mut order = Order::new("cust-1", session.delivery_address.clone(), order_items).unwrap();
    order_repo.insert(&order).await.unwrap();

    let expected_version = order.version;
    order.process_payment(&order.total_amount.clone()).unwrap();
    order_repo
        .update_with_version_check(&order, expected_version)
        .await
        .unwrap();

    let persisted = order_repo.load(order.id).await.unwrap().unwrap();
    assert_eq!(persisted.status, OrderStatus::Paid);
    assert!(persisted.paid_date.is_some());
    assert_eq!(persisted.seller_ids(), vec!["s1".to_string(), "s2".to_string()]);
    assert!(persisted
        .order_items
        .iter()
        .all(|i| i.item_status == OrderItemStatus::Reserved));

    let _ = std::fs::remove_file(&cart_db);
    let _ = std::fs::remove_file(&order_db);
}

/// Optimistic concurrency: a stale `expected_version` is rejected with
/// `ConcurrencyConflict` rather than silently overwriting a concurrent
/// writer's transition (spec §5).
#[tokio::test]
async fn concurrent_update_with_stale_version_is_rejected() {
    let db_path = temp_db_path("concurrency");
    let repo = OrderRepository::new(db_path.to_str().unwrap()).unwrap();

    let item = OrderItem::new(
        Isbn::parse("9780123456789").unwrap(),
        "s1",
        1,
        Money::new(dec!(10), "DKK").unwrap(),
    )
    .unwrap();
    let mut order = Order::new("cust-1", delivery_address(), vec![item]).unwrap();
    repo.insert(&order).await.unwrap();

    let stale_version = order.version;
    order.process_payment(&order.total_amount.clone()).unwrap();
    repo.update_with_version_check(&order, stale_version).await.unwrap();

    // Second writer still thinks the version is `stale_version`; the row has
    // already moved on, so this must fail rather than clobber the Paid state.
    let mut racer = repo.load(order.id).await.unwrap().unwrap();
    let racer_result = racer.cancel("duplicate attempt");
    assert!(racer_result.is_err(), "cannot cancel an order already Paid");

    match repo.update_with_version_check(&order, stale_version).await {
        Err(DomainError::ConcurrencyConflict(_)) => {}
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }

    let _ = std::fs::remove_file(&db_path);
}
