//! The service seam between generic handlers and persistence.

use crate::case::to_snake_case;
use crate::entity::Entity;
use crate::error::AppError;
use crate::models::PatchByIdRequest;
use crate::pagination::Pagination;
use crate::repository::Repository;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

/// Operations the generic handlers delegate to. Implement it to add domain rules around
/// persistence, or use `RepositoryService` for plain CRUD.
#[async_trait]
pub trait CrudService<T: Entity>: Send + Sync + 'static {
    async fn create(&self, entity: T) -> Result<T, AppError>;

    async fn create_batch(&self, entities: Vec<T>) -> Result<Vec<T>, AppError>;

    async fn update_by_id(&self, id: &str, entity: T) -> Result<T, AppError>;

    async fn patch_by_id(&self, patch: PatchByIdRequest) -> Result<T, AppError>;

    async fn get_all(&self, pagination: Pagination) -> Result<Vec<T>, AppError>;

    /// Collection read restricted by `(column, value)` equality filters, e.g. from path parameters.
    async fn get_all_by_fields(&self, filters: Vec<(String, Value)>, pagination: Pagination) -> Result<Vec<T>, AppError>;

    /// `Ok(None)` when no live record has this id.
    async fn get_one_by_id(&self, id: &str) -> Result<Option<T>, AppError>;

    /// Like `get_one_by_id`, but soft-deleted records are found too.
    async fn get_one_including_deleted_by_id(&self, id: &str) -> Result<Option<T>, AppError>;

    /// First live record matching every filter; `AppError::NotFound` when there is none.
    async fn get_one_by_fields(&self, filters: Vec<(String, Value)>) -> Result<T, AppError>;

    async fn delete_softly_by_id(&self, id: &str) -> Result<u64, AppError>;

    /// Physical delete of a live record.
    async fn delete_hard_by_id(&self, id: &str) -> Result<u64, AppError>;

    async fn delete_permanently_by_id(&self, id: &str) -> Result<u64, AppError>;
}

/// `CrudService` straight onto a `Repository`, with a fixed set of preloads for reads.
pub struct RepositoryService<T> {
    repo: Repository<T>,
    preloads: Vec<&'static str>,
}

impl<T: Entity> RepositoryService<T> {
    pub fn new(pool: PgPool) -> Self {
        RepositoryService {
            repo: Repository::new(pool),
            preloads: Vec::new(),
        }
    }

    /// Eagerly load these associations (by `Relation::name`) on every read.
    pub fn with_preloads(mut self, preloads: &[&'static str]) -> Self {
        self.preloads = preloads.to_vec();
        self
    }

    pub fn repository(&self) -> &Repository<T> {
        &self.repo
    }
}

#[async_trait]
impl<T: Entity> CrudService<T> for RepositoryService<T> {
    async fn create(&self, entity: T) -> Result<T, AppError> {
        self.repo.create(&entity).await
    }

    async fn create_batch(&self, entities: Vec<T>) -> Result<Vec<T>, AppError> {
        self.repo.create_batch(&entities).await
    }

    async fn update_by_id(&self, id: &str, entity: T) -> Result<T, AppError> {
        self.repo.update_by_id(id, entity).await
    }

    async fn patch_by_id(&self, patch: PatchByIdRequest) -> Result<T, AppError> {
        self.repo.patch_by_id(&patch.id, &patch.column_name, &patch.patch_value).await
    }

    async fn get_all(&self, pagination: Pagination) -> Result<Vec<T>, AppError> {
        self.repo.get_all(&pagination, &self.preloads).await
    }

    async fn get_all_by_fields(&self, filters: Vec<(String, Value)>, pagination: Pagination) -> Result<Vec<T>, AppError> {
        self.repo
            .get_all_by_fields(&snake_case_filters(filters), &pagination, &self.preloads)
            .await
    }

    async fn get_one_by_id(&self, id: &str) -> Result<Option<T>, AppError> {
        self.repo.get_one_by_id(id, &self.preloads).await
    }

    async fn get_one_including_deleted_by_id(&self, id: &str) -> Result<Option<T>, AppError> {
        self.repo.get_one_including_deleted_by_id(id, &self.preloads).await
    }

    async fn get_one_by_fields(&self, filters: Vec<(String, Value)>) -> Result<T, AppError> {
        self.repo.get_one_by_fields(&snake_case_filters(filters)).await
    }

    async fn delete_softly_by_id(&self, id: &str) -> Result<u64, AppError> {
        self.repo.delete_soft_by_id(id).await
    }

    async fn delete_hard_by_id(&self, id: &str) -> Result<u64, AppError> {
        self.repo.delete_hard_by_id(id).await
    }

    async fn delete_permanently_by_id(&self, id: &str) -> Result<u64, AppError> {
        self.repo.delete_permanent_by_id(id).await
    }
}

fn snake_case_filters(filters: Vec<(String, Value)>) -> Vec<(String, Value)> {
    filters.into_iter().map(|(k, v)| (to_snake_case(&k), v)).collect()
}
