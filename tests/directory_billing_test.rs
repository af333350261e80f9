//! Customers, providers, invoices and GPS locations.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn customer_crud_with_search() {
    let app = TestApp::new().await;
    let acme = app.create_customer("Acme Plumbing").await;
    app.create_customer("Blue Sky Roofing").await;

    let page = response_json(
        app.request_authenticated(Method::GET, "/api/v1/customers?search=acme", None)
            .await,
    )
    .await;
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["id"], acme.as_str());

    let page = response_json(
        app.request_authenticated(Method::GET, "/api/v1/customers?search=%25", None)
            .await,
    )
    .await;
    assert_eq!(page["pagination"]["total"], 0);

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/customers/{acme}"),
            Some(json!({ "phone": "555-0100" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;
    assert_eq!(updated["phone"], "555-0100");
    assert_eq!(updated["name"], "Acme Plumbing");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/customers/{acme}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/customers/{acme}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_with_work_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Busy Co").await;
    app.create_work_order(json!({ "title": "Job", "customerId": customer }))
        .await;

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/customers/{customer}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn provider_crud() {
    let app = TestApp::new().await;
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/providers",
            Some(json!({ "name": "Sparky Electric", "specialty": "electrical" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let provider = response_json(response).await;
    let uri = format!("/api/v1/providers/{}", provider["id"].as_str().unwrap());

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "contactName": "Sam" })))
        .await;
    assert_eq!(response_json(response).await["contactName"], "Sam");

    let list = response_json(
        app.request_authenticated(Method::GET, "/api/v1/providers", None)
            .await,
    )
    .await;
    assert_eq!(list["pagination"]["total"], 1);

    let response = app.request_authenticated(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn invoice_lifecycle() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Wayne Estates").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/invoices",
            Some(json!({ "customerId": customer, "total": "300.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice = response_json(response).await;
    assert_eq!(invoice["status"], "draft");
    assert!(invoice["dueAt"].is_string());
    let uri = format!("/api/v1/invoices/{}", invoice["id"].as_str().unwrap());

    // draft -> paid directly is allowed and stamps paidAt
    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "status": "paid" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let paid = response_json(response).await;
    assert!(paid["paidAt"].is_string());

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "status": "draft" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "status": "void" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.request_authenticated(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invoice_validation_and_void_delete() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/invoices",
            Some(json!({ "workOrderId": "nope", "total": "1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let invoice = response_json(
        app.request_authenticated(Method::POST, "/api/v1/invoices", Some(json!({ "total": "5" })))
            .await,
    )
    .await;
    let uri = format!("/api/v1/invoices/{}", invoice["id"].as_str().unwrap());
    app.request_authenticated(Method::PUT, &uri, Some(json!({ "status": "void" })))
        .await;
    let response = app.request_authenticated(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn technician_location_is_visible_to_dispatch() {
    let app = TestApp::new().await;
    let (tech_id, tech) = app.create_user("Gina Gps", "technician").await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/locations/me",
            Some(json!({ "latitude": 47.6, "longitude": -122.3, "heading": 90.0 })),
            Some(&tech),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fix = response_json(response).await;
    assert_eq!(fix["userId"], tech_id.as_str());
    assert_eq!(fix["userName"], "Gina Gps");

    let all = response_json(
        app.request_authenticated(Method::GET, "/api/v1/locations", None)
            .await,
    )
    .await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let one = response_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/locations/{tech_id}"), None)
            .await,
    )
    .await;
    assert_eq!(one["latitude"], 47.6);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/locations/someone-else", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn out_of_range_coordinates_are_rejected() {
    let app = TestApp::new().await;
    let (_, tech) = app.create_user("Otto Range", "technician").await;
    let response = app
        .request(
            Method::PUT,
            "/api/v1/locations/me",
            Some(json!({ "latitude": 91.0, "longitude": 0.0 })),
            Some(&tech),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_metrics_and_docs_are_public() {
    let app = TestApp::new().await;
    for uri in ["/health", "/metrics", "/api-docs/openapi.json"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}
