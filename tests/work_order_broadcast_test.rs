//! Work order mutations reach every open event channel, and the invoice
//! side effects of creating and repricing an order.

mod common;

use std::time::Duration;

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use common::{response_json, TestApp};
use fieldservice_api::events::{BroadcastEvent, EventKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("valid decimal")
}

#[tokio::test]
async fn creating_wo42_bills_the_customer_and_notifies_subscribers() {
    let app = TestApp::new().await;
    let customer_id = app.create_customer("Acme Plumbing").await;
    let mut subscriber = app.state.events.subscribe();

    let order = app
        .create_work_order(json!({
            "id": "wo42",
            "title": "Replace boiler valve",
            "customerId": customer_id,
            "price": "120",
        }))
        .await;
    assert_eq!(order["id"], "wo42");
    assert_eq!(order["status"], "scheduled");

    let frame = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
        .await
        .expect("frame within a second")
        .expect("subscription open");
    assert_eq!(frame.kind, EventKind::WorkOrderCreated);
    assert_eq!(frame.name(), "work-order-created");
    let data: Value = serde_json::from_str(&frame.data).unwrap();
    assert_eq!(data["id"], "wo42");

    let response = app
        .request_authenticated(Method::GET, "/api/v1/invoices?workOrderId=wo42", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let invoices = response_json(response).await;
    assert_eq!(invoices["pagination"]["total"], 1);
    let invoice = &invoices["data"][0];
    assert_eq!(decimal(&invoice["total"]), dec!(120));
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["customerId"], customer_id.as_str());
    assert!(invoice["number"].as_str().unwrap().starts_with("INV-"));
}

#[tokio::test]
async fn broadcast_without_subscribers_is_a_no_op() {
    let app = TestApp::new().await;
    assert_eq!(app.state.events.subscriber_count(), 0);

    let report = app
        .state
        .events
        .broadcast_all(BroadcastEvent::work_order_deleted("nobody-listening"));
    assert_eq!(report.attempted, 0);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, 0);

    // A mutation with no one listening still succeeds.
    let order = app
        .create_work_order(json!({ "title": "Quiet install" }))
        .await;
    assert!(order["id"].as_str().is_some());
}

#[tokio::test]
async fn every_subscriber_sees_update_and_delete_in_order() {
    let app = TestApp::new().await;
    let order = app
        .create_work_order(json!({ "id": "wo-7", "title": "Inspect roof" }))
        .await;
    assert_eq!(order["id"], "wo-7");

    let mut first = app.state.events.subscribe();
    let mut second = app.state.events.subscribe();

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/work-orders/wo-7",
            Some(json!({ "status": "in_progress" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/work-orders/wo-7", None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for subscription in [&mut first, &mut second] {
        let updated = subscription.recv().await.unwrap();
        let deleted = subscription.recv().await.unwrap();
        assert_eq!(updated.kind, EventKind::WorkOrderUpdated);
        assert_eq!(deleted.kind, EventKind::WorkOrderDeleted);
        assert!(deleted.seq > updated.seq);
        let data: Value = serde_json::from_str(&deleted.data).unwrap();
        assert_eq!(data, json!({ "id": "wo-7" }));
    }
}

#[tokio::test]
async fn update_event_carries_the_returned_order_with_its_notes() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-9", "title": "Bleed radiators" }))
        .await;
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders/wo-9/notes",
            Some(json!({ "body": "Key under mat" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut subscriber = app.state.events.subscribe();
    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/work-orders/wo-9",
            Some(json!({ "title": "Bleed all radiators" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let returned = response_json(response).await;
    assert_eq!(returned["notes"].as_array().unwrap().len(), 1);

    let frame = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
        .await
        .expect("frame within a second")
        .expect("subscription open");
    assert_eq!(frame.kind, EventKind::WorkOrderUpdated);
    let data: Value = serde_json::from_str(&frame.data).unwrap();
    assert_eq!(data, returned);
}

#[tokio::test]
async fn dropped_subscription_leaves_the_registry() {
    let app = TestApp::new().await;
    let subscription = app.state.events.subscribe();
    assert_eq!(app.state.events.subscriber_count(), 1);
    drop(subscription);
    assert_eq!(app.state.events.subscriber_count(), 0);
}

#[tokio::test]
async fn event_stream_requires_a_token_and_speaks_sse() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/events", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri(format!("/api/v1/events?access_token={}", app.token()))
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(app.state.events.subscriber_count(), 1);

    drop(response);
    assert_eq!(app.state.events.subscriber_count(), 0);
}

#[tokio::test]
async fn repricing_follows_into_draft_invoice_only() {
    let app = TestApp::new().await;
    let customer_id = app.create_customer("Northwind").await;
    app.create_work_order(json!({
        "id": "wo-price",
        "title": "Service HVAC",
        "customerId": customer_id,
        "price": "80.00",
    }))
    .await;

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/work-orders/wo-price",
            Some(json!({ "price": "95.50" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let invoices = response_json(
        app.request_authenticated(Method::GET, "/api/v1/invoices?workOrderId=wo-price", None)
            .await,
    )
    .await;
    let invoice_id = invoices["data"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(decimal(&invoices["data"][0]["total"]), dec!(95.50));

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/invoices/{invoice_id}"),
            Some(json!({ "status": "sent" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.request_authenticated(
        Method::PUT,
        "/api/v1/work-orders/wo-price",
        Some(json!({ "price": "200" })),
    )
    .await;
    let invoice = response_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/invoices/{invoice_id}"), None)
            .await,
    )
    .await;
    assert_eq!(invoice["status"], "sent");
    assert_eq!(decimal(&invoice["total"]), dec!(95.50));
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders",
            Some(json!({
                "title": "Backwards window",
                "scheduledStart": "2024-06-02T10:00:00Z",
                "scheduledEnd": "2024-06-01T10:00:00Z",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders",
            Some(json!({ "title": "Ghost customer", "customerId": "missing" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.create_work_order(json!({ "id": "dup", "title": "First" })).await;
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders",
            Some(json!({ "id": "dup", "title": "Second" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_keeps_invoice_but_unlinks_it() {
    let app = TestApp::new().await;
    let customer_id = app.create_customer("Globex").await;
    app.create_work_order(json!({
        "id": "wo-gone",
        "title": "Decommission unit",
        "customerId": customer_id,
        "price": "10",
    }))
    .await;

    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/work-orders/wo-gone", None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/work-orders/wo-gone", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let invoices = response_json(
        app.request_authenticated(
            Method::GET,
            &format!("/api/v1/invoices?customerId={customer_id}"),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(invoices["pagination"]["total"], 1);
    assert!(invoices["data"][0]["workOrderId"].is_null());
}
