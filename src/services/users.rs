use crate::{
    auth::{hash_password, normalize_email},
    db::DbPool,
    dto::{CreateUserRequest, UpdateUserRequest},
    errors::ServiceError,
    models::{user, UserRole},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{page_window, parse_enum};

/// Service for managing user accounts
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let (page, per_page) = page_window(page, per_page);

        let total = user::Entity::find().count(db).await?;
        let users = user::Entity::find()
            .order_by_asc(user::Column::Name)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(db)
            .await?;

        Ok((users, total))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        let role: UserRole = parse_enum("role", &request.role)?;
        let email = normalize_email(&request.email);

        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "a user with email {} already exists",
                email
            )));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(role.to_string()),
            phone: Set(request.phone),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(user_id = %model.id, role = %role, "user created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        id: &str,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        let existing = self.get_user(id).await?;
        let mut active: user::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(password) = request.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = request.role {
            let role: UserRole = parse_enum("role", &role)?;
            active.role = Set(role.to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> Result<(), ServiceError> {
        let result = user::Entity::delete_by_id(id.to_string())
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("User", id));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Ids in `ids` that have no user row.
    pub async fn missing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<String> = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().cloned()))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        Ok(ids
            .iter()
            .filter(|id| !found.contains(id))
            .cloned()
            .collect())
    }
}
