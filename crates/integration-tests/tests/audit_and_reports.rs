//! Login history and dashboard metrics scenarios.

#![allow(clippy::unwrap_used)]

use chrono::{FixedOffset, Utc};

use loka_core::Money;
use loka_core::checkout::CheckoutTotals;
use loka_integration_tests::{Fixture, customer, shipping};
use loka_storefront::db::LoginHistoryStore;
use loka_storefront::services::audit::{AuditRecorder, ClientInfo};
use loka_storefront::services::orders::OrderLifecycle;
use loka_storefront::services::reports::DashboardMetrics;

const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile Safari/604.1";

#[tokio::test]
async fn test_login_then_logout_closes_record() {
    let fixture = Fixture::new().await.unwrap();
    let recorder = AuditRecorder::new(&fixture.store);
    let ayu = customer("ayu@loka.co");
    let client = ClientInfo {
        ip_address: "203.0.113.7".to_owned(),
        user_agent: IPHONE.to_owned(),
    };

    let record = recorder.record_login(&ayu, &client, "session-1").await.unwrap();
    assert_eq!(record.device.browser, "Safari");
    assert_eq!(record.device.os, "iOS");
    assert!(record.is_active());

    // A second device stays open when the first logs out
    recorder
        .record_login(&ayu, &ClientInfo::default(), "session-2")
        .await
        .unwrap();

    let closed = recorder.record_logout(&ayu.email, "session-1").await;
    assert_eq!(closed, Some(record.id));
    assert_eq!(recorder.record_logout(&ayu.email, "session-1").await, None);

    let recent = fixture.store.recent_logins(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent.iter().filter(|r| r.is_active()).count(), 1);
}

#[tokio::test]
async fn test_dashboard_counts_revenue_from_paid_and_completed() {
    let fixture = Fixture::new().await.unwrap();
    let lifecycle = OrderLifecycle::new(&fixture.store);
    let cart = fixture.cart();
    let total = CheckoutTotals::compute(cart.items(), &shipping()).total;
    let buyer = customer("ayu@loka.co");

    let paid = lifecycle.create_from_cart(cart.items(), &buyer, total).await.unwrap();
    lifecycle.confirm_payment(&paid.order_number).await.unwrap();
    let completed = lifecycle.create_from_cart(cart.items(), &buyer, total).await.unwrap();
    lifecycle.confirm_payment(&completed.order_number).await.unwrap();
    lifecycle.complete(&completed.order_number).await.unwrap();
    let cancelled = lifecycle.create_from_cart(cart.items(), &buyer, total).await.unwrap();
    lifecycle.cancel_by_staff(&cancelled.order_number).await.unwrap();
    lifecycle.create_from_cart(cart.items(), &buyer, total).await.unwrap();

    AuditRecorder::new(&fixture.store)
        .record_login(&buyer, &ClientInfo::default(), "session-1")
        .await
        .unwrap();

    let wita = FixedOffset::east_opt(8 * 3600).unwrap();
    let metrics = DashboardMetrics::collect(&fixture.store, Utc::now(), wita)
        .await
        .unwrap();

    assert_eq!(metrics.categories, 1);
    assert_eq!(metrics.products, 2);
    assert_eq!(metrics.products_with_image, 2);
    assert_eq!(metrics.image_completeness, 100);
    assert_eq!(metrics.pending_orders, 1);
    assert_eq!(metrics.paid_orders, 1);
    assert_eq!(metrics.completed_orders, 1);
    assert_eq!(metrics.cancelled_orders, 1);
    assert_eq!(metrics.revenue_total, Money::from_major(580_000));
    assert_eq!(metrics.revenue_today, Money::from_major(580_000));
    assert_eq!(metrics.revenue_month, Money::from_major(580_000));
    assert_eq!(metrics.logins_total, 1);
    assert_eq!(metrics.logins_today, 1);
    assert_eq!(metrics.active_sessions, 1);
}
