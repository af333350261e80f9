use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use fieldservice_api::{app_router, config::AppConfig, db, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@fieldservice.test";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const MULTIPART_BOUNDARY: &str = "fsm-test-boundary";

/// Application harness backed by a throwaway SQLite file and upload dir.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    /// Construct a new test application with fresh database state and a
    /// logged-in admin.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("fieldservice_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.upload_dir = dir.path().join("uploads").display().to_string();
        tweak(&mut cfg);

        std::fs::create_dir_all(cfg.upload_dir()).expect("create upload dir");

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        state
            .auth
            .bootstrap_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("bootstrap admin");

        let router = app_router(state.clone());
        let mut app = Self {
            router,
            state,
            token: String::new(),
            _dir: dir,
        };
        app.token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    /// Bearer token for the bootstrap admin.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login for {email}");
        let body = response_json(response).await;
        body["accessToken"]
            .as_str()
            .expect("accessToken in login response")
            .to_string()
    }

    /// Creates a user with `role` through the admin API and returns
    /// `(user_id, token)`.
    pub async fn create_user(&self, name: &str, role: &str) -> (String, String) {
        let email = format!("{}@fieldservice.test", name.to_lowercase().replace(' ', "."));
        let password = "user-password-123";
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/v1/users",
                Some(json!({
                    "email": email,
                    "name": name,
                    "password": password,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "create {role} {name}");
        let user = response_json(response).await;
        let id = user["id"].as_str().expect("user id").to_string();
        let token = self.login(&email, password).await;
        (id, token)
    }

    pub async fn create_customer(&self, name: &str) -> String {
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/v1/customers",
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response_json(response).await["id"]
            .as_str()
            .expect("customer id")
            .to_string()
    }

    pub async fn create_work_order(&self, body: Value) -> Value {
        let response = self
            .request_authenticated(Method::POST, "/api/v1/work-orders", Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response_json(response).await
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for JSON requests as the admin.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Posts a multipart upload with a `file` part and an optional
    /// `clientToken` part.
    pub async fn upload(
        &self,
        uri: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
        client_token: Option<&str>,
        token: &str,
    ) -> Response {
        let body = multipart_body(file_name, content_type, data, client_token);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Body::from(body))
            .expect("failed to build multipart request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during upload")
    }
}

pub fn multipart_body(
    file_name: &str,
    content_type: &str,
    data: &[u8],
    client_token: Option<&str>,
) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(token) = client_token {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"clientToken\"\r\n\r\n{t}\r\n",
                b = MULTIPART_BOUNDARY,
                t = token
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            f = file_name,
            c = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
        .to_vec()
}

pub async fn response_json(response: Response) -> Value {
    let bytes = response_bytes(response).await;
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
