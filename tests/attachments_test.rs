//! Notes and file resources attached to work orders.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{response_bytes, response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn notes_are_listed_newest_first_and_shown_on_the_order() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-notes", "title": "Rewire panel" }))
        .await;

    for body in ["Parts ordered", "Parts arrived"] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/work-orders/wo-notes/notes",
                Some(json!({ "body": body })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let note = response_json(response).await;
        assert_eq!(note["body"], body);
        assert_eq!(note["workOrderId"], "wo-notes");
        assert!(note["authorId"].is_string());
    }

    let notes = response_json(
        app.request_authenticated(Method::GET, "/api/v1/work-orders/wo-notes/notes", None)
            .await,
    )
    .await;
    let bodies: Vec<&str> = notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies.contains(&"Parts ordered"));

    let order = response_json(
        app.request_authenticated(Method::GET, "/api/v1/work-orders/wo-notes", None)
            .await,
    )
    .await;
    assert_eq!(order["notes"].as_array().unwrap().len(), 2);
    assert_eq!(order["resources"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn blank_note_and_unknown_order_are_rejected() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-n", "title": "Check meter" }))
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders/wo-n/notes",
            Some(json!({ "body": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/work-orders/missing/notes",
            Some(json!({ "body": "Hello" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_or_a_dispatcher_deletes_a_note() {
    let app = TestApp::new().await;
    let (tech_a_id, tech_a) = app.create_user("Alex Tech", "technician").await;
    let (_, tech_b) = app.create_user("Blake Tech", "technician").await;
    app.create_work_order(json!({
        "id": "wo-del",
        "title": "Clear drain",
        "technicianIds": [tech_a_id],
    }))
    .await;

    let note = response_json(
        app.request(
            Method::POST,
            "/api/v1/work-orders/wo-del/notes",
            Some(json!({ "body": "On site" })),
            Some(&tech_a),
        )
        .await,
    )
    .await;
    let uri = format!("/api/v1/work-orders/wo-del/notes/{}", note["id"].as_str().unwrap());

    let response = app.request(Method::DELETE, &uri, None, Some(&tech_b)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.request(Method::DELETE, &uri, None, Some(&tech_a)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(Method::DELETE, &uri, None, Some(&tech_a)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_upload_token_returns_the_first_resource() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-files", "title": "Photo survey" }))
        .await;
    let uri = "/api/v1/work-orders/wo-files/resources";

    let first = app
        .upload(uri, "meter.jpg", "image/jpeg", b"jpeg-bytes", Some("tmp-abc"), app.token())
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = response_json(first).await;
    assert_eq!(first["clientToken"], "tmp-abc");
    assert_eq!(first["sizeBytes"], 10);

    let retry = app
        .upload(uri, "meter.jpg", "image/jpeg", b"jpeg-bytes", Some("tmp-abc"), app.token())
        .await;
    assert_eq!(retry.status(), StatusCode::OK);
    assert_eq!(response_json(retry).await["id"], first["id"]);

    let listed = response_json(app.request_authenticated(Method::GET, uri, None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn uploaded_file_downloads_and_deletes() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-dl", "title": "Manual" }))
        .await;

    let resource = response_json(
        app.upload(
            "/api/v1/work-orders/wo-dl/resources",
            "guide.pdf",
            "application/pdf",
            b"%PDF-1.4 test",
            None,
            app.token(),
        )
        .await,
    )
    .await;
    let file_uri = resource["url"].as_str().unwrap().to_string();
    assert!(file_uri.ends_with("/file"));

    let response = app.request_authenticated(Method::GET, &file_uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("guide.pdf"));
    assert_eq!(response_bytes(response).await, b"%PDF-1.4 test");

    let resource_uri = format!(
        "/api/v1/work-orders/wo-dl/resources/{}",
        resource["id"].as_str().unwrap()
    );
    let response = app
        .request_authenticated(Method::DELETE, &resource_uri, None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request_authenticated(Method::GET, &file_uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_refused() {
    let app = TestApp::with_config(|cfg| cfg.max_upload_bytes = 16).await;
    app.create_work_order(json!({ "id": "wo-big", "title": "Big file" }))
        .await;

    let response = app
        .upload(
            "/api/v1/work-orders/wo-big/resources",
            "big.bin",
            "application/octet-stream",
            &[7u8; 64],
            None,
            app.token(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn upload_without_file_part_is_a_bad_request() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-empty", "title": "Nothing" }))
        .await;

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"clientToken\"\r\n\r\ntmp-1\r\n--{b}--\r\n",
        b = common::MULTIPART_BOUNDARY
    );
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/v1/work-orders/wo-empty/resources")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token()))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", common::MULTIPART_BOUNDARY),
        )
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_the_order_removes_its_files() {
    let app = TestApp::new().await;
    app.create_work_order(json!({ "id": "wo-rm", "title": "Scrap" }))
        .await;
    app.upload(
        "/api/v1/work-orders/wo-rm/resources",
        "a.txt",
        "text/plain",
        b"hello",
        None,
        app.token(),
    )
    .await;
    let dir = app.state.config.upload_dir().join("wo-rm");
    assert!(dir.exists());

    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/work-orders/wo-rm", None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!dir.exists());
}
