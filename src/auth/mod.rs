/*!
 * # Authentication and Authorization Module
 *
 * Password login with argon2 hashes and HS256 JWT access tokens.
 *
 * Tokens are accepted from the `Authorization: Bearer` header, or from an
 * `access_token` query parameter so browser EventSource connections (which
 * cannot set headers) can open the event stream.
 *
 * Roles are coarse: admins do everything, dispatchers manage customers,
 * providers, work orders and invoices, technicians work their assigned
 * orders and report their position.
 */

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as PasswordHashError, PasswordHash, PasswordHasher,
        PasswordVerifier, SaltString,
    },
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dto::{TokenResponse, UserResponse};
use crate::errors::ServiceError;
use crate::models::{user, UserRole};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    /// Admins and dispatchers
    pub fn can_dispatch(&self) -> bool {
        self.role.can_dispatch()
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, access_token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            jwt_audience: "fieldservice-api".to_string(),
            jwt_issuer: "fieldservice-auth".to_string(),
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Authentication service that handles credential checks and token issuance
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Issues an access token for `user`.
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as usize,
            user: UserResponse::from(user.clone()),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.jwt_audience]);
        validation.set_issuer(&[&self.config.jwt_issuer]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Checks an email/password pair against the users table.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.active {
            warn!(user_id = %user.id, "login attempt for deactivated user");
            return Err(AuthError::InvalidCredentials);
        }

        verify_password(password, &user.password_hash)?;
        debug!(user_id = %user.id, "user authenticated");
        Ok(user)
    }

    /// Creates the configured admin account when no users exist yet.
    /// Returns true when an account was created.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        let existing = user::Entity::find()
            .count(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        if existing > 0 {
            return Ok(false);
        }

        let now = Utc::now();
        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(normalize_email(email)),
            name: Set("Administrator".to_string()),
            password_hash: Set(hash_password(password)?),
            role: Set(UserRole::Admin.to_string()),
            phone: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        admin
            .insert(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!(email = %email, "bootstrap admin account created");
        Ok(true)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashError(e.to_string()))
}

pub fn verify_password(candidate: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| AuthError::HashError(e.to_string()))?;
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .map_err(|e| match e {
            PasswordHashError::Password => AuthError::InvalidCredentials,
            other => AuthError::HashError(other.to_string()),
        })
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    HashError(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => ServiceError::Unauthorized("Authentication required".into()),
            AuthError::InvalidCredentials => {
                ServiceError::Unauthorized("Invalid credentials".into())
            }
            AuthError::InvalidToken => {
                ServiceError::Unauthorized("Invalid authentication token".into())
            }
            AuthError::TokenExpired => ServiceError::Unauthorized("Token has expired".into()),
            AuthError::InsufficientPermissions => {
                ServiceError::Forbidden("Insufficient permissions".into())
            }
            AuthError::HashError(msg) => ServiceError::HashError(msg),
            AuthError::TokenCreation(msg)
            | AuthError::DatabaseError(msg)
            | AuthError::InternalError(msg) => ServiceError::InternalError(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Bearer header first, then `?access_token=`.
fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    from_header.or_else(|| {
        uri.query()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Authentication middleware that validates the token and stores [`AuthUser`]
/// in the request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response()
        }
    };

    let token = match extract_token(request.headers(), request.uri()) {
        Some(token) => token,
        None => return AuthError::MissingAuth.into_response(),
    };

    match auth_service.validate_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser::from(claims));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects users whose role is not listed. Admins always pass.
pub async fn role_middleware(
    State(allowed): State<Arc<[UserRole]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.is_admin() && !allowed.contains(&user.role) {
        debug!(user_id = %user.user_id, role = %user.role, "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[UserRole]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[UserRole]) -> Self {
        let allowed: Arc<[UserRole]> = roles.into();
        self.layer(axum::middleware::from_fn_with_state(
            allowed,
            role_middleware,
        ))
        .with_auth()
    }
}
