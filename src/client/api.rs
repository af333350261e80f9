//! Typed HTTP client for the work order API.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{header, multipart, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dto::{
    CreateNoteRequest, CreateWorkOrderRequest, LoginRequest, NoteResponse, ResourceResponse,
    TokenResponse, UpdateWorkOrderRequest, WorkOrderResponse,
};
use crate::errors::ErrorResponse;
use crate::handlers::common::PaginatedResponse;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not logged in")]
    MissingToken,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// One file for [`FsmClient::upload_resource`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct FsmClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FsmClient {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(builder.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), ClientError> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Self::send_json(self.request(Method::GET, path)?).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Self::send_json(self.request(Method::POST, path)?.json(body)).await
    }

    /// Logs in and keeps the token for later calls.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token: TokenResponse =
            Self::send_json(self.http.post(self.url("/auth/login")).json(&body)).await?;
        self.token = Some(token.access_token.clone());
        debug!(user_id = %token.user.id, "logged in");
        Ok(token)
    }

    pub async fn list_work_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<PaginatedResponse<WorkOrderResponse>, ClientError> {
        Self::send_json(
            self.request(Method::GET, "/work-orders")?
                .query(&[("page", page), ("perPage", per_page)]),
        )
        .await
    }

    /// The work order with its notes and resources.
    pub async fn get_work_order(&self, id: &str) -> Result<WorkOrderResponse, ClientError> {
        self.get(&format!("/work-orders/{}", id)).await
    }

    pub async fn create_work_order(
        &self,
        request: &CreateWorkOrderRequest,
    ) -> Result<WorkOrderResponse, ClientError> {
        self.post("/work-orders", request).await
    }

    pub async fn update_work_order(
        &self,
        id: &str,
        request: &UpdateWorkOrderRequest,
    ) -> Result<WorkOrderResponse, ClientError> {
        Self::send_json(
            self.request(Method::PUT, &format!("/work-orders/{}", id))?
                .json(request),
        )
        .await
    }

    pub async fn delete_work_order(&self, id: &str) -> Result<(), ClientError> {
        Self::send_empty(self.request(Method::DELETE, &format!("/work-orders/{}", id))?).await
    }

    pub async fn list_notes(&self, work_order_id: &str) -> Result<Vec<NoteResponse>, ClientError> {
        self.get(&format!("/work-orders/{}/notes", work_order_id))
            .await
    }

    pub async fn add_note(&self, work_order_id: &str, body: &str) -> Result<NoteResponse, ClientError> {
        let request = CreateNoteRequest {
            body: body.to_string(),
        };
        self.post(&format!("/work-orders/{}/notes", work_order_id), &request)
            .await
    }

    pub async fn delete_note(&self, work_order_id: &str, note_id: &str) -> Result<(), ClientError> {
        Self::send_empty(self.request(
            Method::DELETE,
            &format!("/work-orders/{}/notes/{}", work_order_id, note_id),
        )?)
        .await
    }

    pub async fn list_resources(
        &self,
        work_order_id: &str,
    ) -> Result<Vec<ResourceResponse>, ClientError> {
        self.get(&format!("/work-orders/{}/resources", work_order_id))
            .await
    }

    /// Multipart upload. Repeating a call with the same `client_token`
    /// returns the resource stored by the first one.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.data.len()))]
    pub async fn upload_resource(
        &self,
        work_order_id: &str,
        file: UploadFile,
        client_token: Option<&str>,
    ) -> Result<ResourceResponse, ClientError> {
        let part = multipart::Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let mut form = multipart::Form::new().part("file", part);
        if let Some(token) = client_token {
            form = form.text("clientToken", token.to_string());
        }
        Self::send_json(
            self.request(
                Method::POST,
                &format!("/work-orders/{}/resources", work_order_id),
            )?
            .multipart(form),
        )
        .await
    }

    pub async fn download_resource(
        &self,
        work_order_id: &str,
        resource_id: &str,
    ) -> Result<Bytes, ClientError> {
        let response = Self::check(
            self.request(
                Method::GET,
                &format!("/work-orders/{}/resources/{}/file", work_order_id, resource_id),
            )?
            .send()
            .await?,
        )
        .await?;
        Ok(response.bytes().await?)
    }

    pub async fn delete_resource(
        &self,
        work_order_id: &str,
        resource_id: &str,
    ) -> Result<(), ClientError> {
        Self::send_empty(self.request(
            Method::DELETE,
            &format!("/work-orders/{}/resources/{}", work_order_id, resource_id),
        )?)
        .await
    }

    /// Opens `/events` and returns the raw body; decode it with
    /// [`super::sse::FrameDecoder`].
    pub async fn open_event_stream(
        &self,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, ClientError> {
        let response = Self::check(
            self.request(Method::GET, "/events")?
                .header(header::ACCEPT, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .send()
                .await?,
        )
        .await?;
        Ok(response.bytes_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn work_order_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Fix valve",
            "description": null,
            "status": "scheduled",
            "priority": "normal",
            "customerId": "c1",
            "providerId": null,
            "address": null,
            "scheduledStart": null,
            "scheduledEnd": null,
            "technicianIds": [],
            "price": "120",
            "createdBy": "u1",
            "createdAt": "2024-05-01T08:00:00Z",
            "updatedAt": "2024-05-01T08:00:00Z",
            "notes": [],
            "resources": []
        })
    }

    #[tokio::test]
    async fn login_stores_token_for_later_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"email": "d@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "tok",
                "tokenType": "Bearer",
                "expiresIn": 3600,
                "user": {
                    "id": "u1", "email": "d@example.com", "name": "Dee",
                    "role": "dispatcher", "phone": null, "active": true,
                    "createdAt": "2024-05-01T08:00:00Z", "updatedAt": "2024-05-01T08:00:00Z"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/work-orders/wo42"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(work_order_json("wo42")))
            .mount(&server)
            .await;

        let mut client = FsmClient::new(server.uri()).unwrap();
        client.login("d@example.com", "pw").await.unwrap();
        assert_eq!(client.token(), Some("tok"));

        let order = client.get_work_order("wo42").await.unwrap();
        assert_eq!(order.id, "wo42");
        assert_eq!(order.notes, Some(vec![]));
    }

    #[tokio::test]
    async fn error_bodies_become_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/work-orders/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "Not Found",
                "message": "work order missing not found",
                "timestamp": "2024-05-01T08:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = FsmClient::new(server.uri()).unwrap().with_token("tok");
        let err = client.get_work_order("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_matches!(err, ClientError::Status { message, .. } if message.contains("missing"));
    }

    #[tokio::test]
    async fn calls_without_token_fail_fast() {
        let client = FsmClient::new("http://127.0.0.1:9").unwrap();
        assert_matches!(client.list_notes("wo1").await, Err(ClientError::MissingToken));
    }

    #[tokio::test]
    async fn list_sends_camel_case_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/work-orders"))
            .and(query_param("perPage", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [work_order_json("wo1")],
                "pagination": {"page": 1, "perPage": 5, "total": 1, "totalPages": 1}
            })))
            .mount(&server)
            .await;

        let client = FsmClient::new(server.uri()).unwrap().with_token("tok");
        let page = client.list_work_orders(1, 5).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.pagination.total, 1);
    }
}
