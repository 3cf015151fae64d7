//! Checkout scenarios: totals, gateway handoff and atomic order creation.

#![allow(clippy::unwrap_used)]

use loka_core::cart::Cart;
use loka_core::{Money, OrderNumber, OrderStatus};
use loka_integration_tests::{Fixture, ScriptedGateway, customer, session, shipping};
use loka_storefront::db::{OrderStore, RepositoryError};
use loka_storefront::models::session_keys;
use loka_storefront::services::cart::{CartLocks, CartService, save_cart};
use loka_storefront::services::checkout::{CheckoutError, CheckoutService};
use loka_storefront::services::orders::{OrderError, OrderLifecycle};

#[tokio::test]
async fn test_totals_for_reference_cart() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();
    let totals = CheckoutService::new(&fixture.store, &gateway, shipping()).totals(&fixture.cart());

    assert_eq!(totals.subtotal, Money::from_major(250_000));
    assert_eq!(totals.shipping, Money::from_major(15_000));
    assert_eq!(totals.tax, Money::from_major(25_000));
    assert_eq!(totals.total, Money::from_major(290_000));
}

#[tokio::test]
async fn test_place_order_creates_pending_order() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();
    let buyer = customer("wayan@loka.co");

    let placed = CheckoutService::new(&fixture.store, &gateway, shipping())
        .place_order(&fixture.cart(), &buyer)
        .await
        .unwrap();

    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.total_amount, Money::from_major(290_000));
    assert_eq!(placed.payment.token, "snap-token-1");
    assert_eq!(fixture.store.order_counts(), (1, 2));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].order_number, placed.order.order_number);
    assert_eq!(requests[0].amount, Money::from_major(290_000));
    assert_eq!(requests[0].customer, buyer);

    // Stock moves on payment, not on order creation
    assert_eq!(fixture.stock(&fixture.a).await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_gateway_failure_creates_no_order() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::failing();

    let result = CheckoutService::new(&fixture.store, &gateway, shipping())
        .place_order(&fixture.cart(), &customer("wayan@loka.co"))
        .await;

    assert!(matches!(result, Err(CheckoutError::Gateway(_))));
    assert_eq!(gateway.calls(), 1);
    assert_eq!(fixture.store.order_counts(), (0, 0));
}

#[tokio::test]
async fn test_empty_cart_never_reaches_gateway() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();

    let result = CheckoutService::new(&fixture.store, &gateway, shipping())
        .place_order(&Cart::new(), &customer("wayan@loka.co"))
        .await;

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn test_order_creation_is_atomic() {
    let fixture = Fixture::new().await.unwrap();
    fixture.store.fail_next_order_after(1);

    let result = OrderLifecycle::new(&fixture.store)
        .create_from_cart(
            fixture.cart().items(),
            &customer("wayan@loka.co"),
            Money::from_major(290_000),
        )
        .await;

    assert!(matches!(
        result,
        Err(OrderError::Repository(RepositoryError::Database(_)))
    ));
    assert_eq!(fixture.store.order_counts(), (0, 0));

    // The injected failure is one-shot
    OrderLifecycle::new(&fixture.store)
        .create_from_cart(
            fixture.cart().items(),
            &customer("wayan@loka.co"),
            Money::from_major(290_000),
        )
        .await
        .unwrap();
    assert_eq!(fixture.store.order_counts(), (1, 2));
}

#[tokio::test]
async fn test_customer_sees_only_own_orders_newest_first() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();
    let service = CheckoutService::new(&fixture.store, &gateway, shipping());

    let first = service
        .place_order(&fixture.cart(), &customer("wayan@loka.co"))
        .await
        .unwrap();
    let second = service
        .place_order(&fixture.cart(), &customer("wayan@loka.co"))
        .await
        .unwrap();
    service
        .place_order(&fixture.cart(), &customer("nyoman@loka.co"))
        .await
        .unwrap();

    let orders = fixture
        .store
        .orders_for_customer(&customer("wayan@loka.co").email)
        .await
        .unwrap();
    let numbers: Vec<_> = orders.iter().map(|o| o.order_number.clone()).collect();
    assert_eq!(numbers, vec![second.order.order_number, first.order.order_number]);
}

#[tokio::test]
async fn test_double_submit_opens_one_payment() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();
    let locks = CartLocks::default();
    let checkout = CheckoutService::new(&fixture.store, &gateway, shipping());
    let buyer = customer("wayan@loka.co");
    let session = session();
    save_cart(&session, &fixture.cart()).await.unwrap();
    session.save().await.unwrap();

    let (first, second) = tokio::join!(
        checkout.start_payment(&session, &locks, &buyer),
        checkout.start_payment(&session, &locks, &buyer),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first, second);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(fixture.store.order_counts(), (1, 2));
    assert_eq!(
        session.get::<OrderNumber>(session_keys::CURRENT_ORDER_ID).await.unwrap(),
        Some(first.order_number.clone())
    );

    // A changed cart needs a new order
    CartService::new(&fixture.store, &locks)
        .add(&session, fixture.b.id, 1)
        .await
        .unwrap();
    let third = checkout.start_payment(&session, &locks, &buyer).await.unwrap();
    assert_ne!(third.order_number, first.order_number);
    assert_eq!(third.total, Money::from_major(345_000));
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test]
async fn test_paid_order_is_not_reused() {
    let fixture = Fixture::new().await.unwrap();
    let gateway = ScriptedGateway::accepting();
    let locks = CartLocks::default();
    let checkout = CheckoutService::new(&fixture.store, &gateway, shipping());
    let buyer = customer("wayan@loka.co");
    let session = session();
    save_cart(&session, &fixture.cart()).await.unwrap();

    let first = checkout.start_payment(&session, &locks, &buyer).await.unwrap();
    OrderLifecycle::new(&fixture.store)
        .confirm_payment(&first.order_number)
        .await
        .unwrap();

    let second = checkout.start_payment(&session, &locks, &buyer).await.unwrap();
    assert_ne!(second.order_number, first.order_number);
    assert_eq!(gateway.calls(), 2);
}
