use crate::{
    db::DbPool,
    errors::ServiceError,
    metrics::BUSINESS_METRICS,
    models::{work_order, work_order_resource},
};
use bytes::Bytes;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const MAX_STORED_NAME_LEN: usize = 100;

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Caller-chosen idempotency key, scoped to the work order
    pub client_token: Option<String>,
}

/// Result of an upload; `created` is false when a previous upload with the
/// same client token was returned instead.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub resource: work_order_resource::Model,
    pub created: bool,
}

/// Reduces an uploaded file name to something safe to put on disk.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_STORED_NAME_LEN).collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Work order attachments, stored under `upload_dir/<workOrderId>/`.
#[derive(Clone)]
pub struct ResourceService {
    db_pool: Arc<DbPool>,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
}

impl ResourceService {
    pub fn new(db_pool: Arc<DbPool>, upload_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            db_pool,
            upload_dir,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    async fn ensure_work_order(&self, work_order_id: &str) -> Result<(), ServiceError> {
        work_order::Entity::find_by_id(work_order_id.to_string())
            .one(&*self.db_pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Work order", work_order_id))
    }

    async fn find_by_token(
        &self,
        work_order_id: &str,
        token: &str,
    ) -> Result<Option<work_order_resource::Model>, ServiceError> {
        Ok(work_order_resource::Entity::find()
            .filter(work_order_resource::Column::WorkOrderId.eq(work_order_id))
            .filter(work_order_resource::Column::ClientToken.eq(token))
            .one(&*self.db_pool)
            .await?)
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_resources(
        &self,
        work_order_id: &str,
    ) -> Result<Vec<work_order_resource::Model>, ServiceError> {
        self.ensure_work_order(work_order_id).await?;
        Ok(work_order_resource::Entity::find()
            .filter(work_order_resource::Column::WorkOrderId.eq(work_order_id))
            .order_by_desc(work_order_resource::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_resource(
        &self,
        work_order_id: &str,
        resource_id: &str,
    ) -> Result<work_order_resource::Model, ServiceError> {
        work_order_resource::Entity::find_by_id(resource_id.to_string())
            .filter(work_order_resource::Column::WorkOrderId.eq(work_order_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Resource", resource_id))
    }

    /// Writes the file and records it. A repeated upload carrying the same
    /// client token returns the first resource untouched.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.data.len()))]
    pub async fn upload(
        &self,
        work_order_id: &str,
        upload: NewUpload,
        uploaded_by: Option<String>,
    ) -> Result<StoredUpload, ServiceError> {
        if upload.data.len() > self.max_upload_bytes {
            return Err(ServiceError::PayloadTooLarge(format!(
                "file exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }
        self.ensure_work_order(work_order_id).await?;

        let client_token = upload
            .client_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(token) = &client_token {
            if let Some(existing) = self.find_by_token(work_order_id, token).await? {
                info!(resource_id = %existing.id, "duplicate upload token, returning existing resource");
                return Ok(StoredUpload {
                    resource: existing,
                    created: false,
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        let relative = Path::new(work_order_id)
            .join(format!("{}-{}", id, sanitize_file_name(&upload.file_name)));
        let absolute = self.upload_dir.join(&relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, &upload.data).await?;

        let inserted = work_order_resource::ActiveModel {
            id: Set(id),
            work_order_id: Set(work_order_id.to_string()),
            file_name: Set(upload.file_name),
            content_type: Set(upload.content_type),
            size_bytes: Set(upload.data.len() as i64),
            storage_path: Set(relative.to_string_lossy().into_owned()),
            client_token: Set(client_token.clone()),
            uploaded_by: Set(uploaded_by),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await;

        match inserted {
            Ok(resource) => {
                BUSINESS_METRICS.resources_uploaded.inc();
                info!(resource_id = %resource.id, work_order_id = %work_order_id, "resource uploaded");
                Ok(StoredUpload {
                    resource,
                    created: true,
                })
            }
            Err(e) => {
                self.remove_file(&absolute).await;
                // a concurrent upload with the same token won the unique index
                if let Some(token) = &client_token {
                    if let Some(existing) = self.find_by_token(work_order_id, token).await? {
                        return Ok(StoredUpload {
                            resource: existing,
                            created: false,
                        });
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Metadata and file contents for a download.
    #[instrument(skip(self))]
    pub async fn read_file(
        &self,
        work_order_id: &str,
        resource_id: &str,
    ) -> Result<(work_order_resource::Model, Vec<u8>), ServiceError> {
        let resource = self.get_resource(work_order_id, resource_id).await?;
        let path = self.upload_dir.join(&resource.storage_path);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok((resource, data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "resource row has no file on disk");
                Err(ServiceError::not_found("Resource file", resource_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_resource(
        &self,
        work_order_id: &str,
        resource_id: &str,
    ) -> Result<(), ServiceError> {
        let resource = self.get_resource(work_order_id, resource_id).await?;
        work_order_resource::Entity::delete_by_id(resource.id.clone())
            .exec(&*self.db_pool)
            .await?;
        self.remove_file(&self.upload_dir.join(&resource.storage_path))
            .await;
        info!(resource_id = %resource_id, work_order_id = %work_order_id, "resource deleted");
        Ok(())
    }

    async fn remove_file(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove stored file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_flattened_and_made_safe() {
        assert_eq!(sanitize_file_name("photo 1.jpg"), "photo_1.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\temp\\meter.png"), "meter.png");
        assert_eq!(sanitize_file_name(".htaccess"), "htaccess");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(&"x".repeat(300)).len(), MAX_STORED_NAME_LEN);
    }
}
