//! Generic CRUD handlers: bind, validate, delegate to the service, wrap the result in the envelope.

use crate::case::to_snake_case;
use crate::entity::Entity;
use crate::error::AppError;
use crate::extractors::{ValidatedBatch, ValidatedJson};
use crate::models::PatchByIdRequest;
use crate::pagination::Pagination;
use crate::response::{set_response, success_created, success_ok, Envelope, NOT_FOUND};
use crate::service::CrudService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

pub async fn create<T, S>(
    State(service): State<Arc<S>>,
    ValidatedJson(body): ValidatedJson<T>,
) -> Result<Envelope<T>, AppError>
where
    T: Entity + Validate,
    S: CrudService<T>,
{
    let created = service.create(body).await?;
    Ok(success_created(created))
}

pub async fn create_batch<T, S>(
    State(service): State<Arc<S>>,
    ValidatedBatch(items): ValidatedBatch<T>,
) -> Result<Envelope<Vec<T>>, AppError>
where
    T: Entity + Validate,
    S: CrudService<T>,
{
    let created = service.create_batch(items).await?;
    Ok(success_created(created))
}

pub async fn update_by_id<T, S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<T>,
) -> Result<Envelope<T>, AppError>
where
    T: Entity + Validate,
    S: CrudService<T>,
{
    let updated = service.update_by_id(&id, body).await?;
    Ok(success_created(updated))
}

pub async fn patch_by_id<T, S>(
    State(service): State<Arc<S>>,
    ValidatedJson(patch): ValidatedJson<PatchByIdRequest>,
) -> Result<Envelope<T>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    let patched = service.patch_by_id(patch).await?;
    Ok(success_created(patched))
}

/// GET collection. Query: `page` (default 1), `limit` (default 10, max 100), `sort`.
pub async fn get_all<T, S>(
    State(service): State<Arc<S>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Envelope<Vec<T>>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    let rows = service.get_all(Pagination::from_query(&params)).await?;
    Ok(success_ok(rows))
}

/// GET collection scoped by the route's path parameters, e.g. `/widgets/by-client/:client_id`
/// filters on `client_id`. Parameter names are converted to snake_case column names.
pub async fn get_all_by_path_params<T, S>(
    State(service): State<Arc<S>>,
    Path(path_params): Path<HashMap<String, String>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Envelope<Vec<T>>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    let mut filters: Vec<(String, Value)> = path_params
        .into_iter()
        .map(|(k, v)| (to_snake_case(&k), Value::String(v)))
        .collect();
    filters.sort_by(|a, b| a.0.cmp(&b.0));
    let rows = service
        .get_all_by_fields(filters, Pagination::from_query(&params))
        .await?;
    Ok(success_ok(rows))
}

/// GET one. A missing record answers 404 with a null result.
pub async fn get_one_by_id<T, S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Envelope<T>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    match service.get_one_by_id(&id).await? {
        Some(row) if row.is_persisted() => Ok(success_ok(row)),
        _ => {
            tracing::info!(table = T::TABLE, id = %id, "not found");
            Ok(set_response(StatusCode::NOT_FOUND, NOT_FOUND, None))
        }
    }
}

pub async fn delete_softly_by_id<T, S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Envelope<u64>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    let rows_affected = service.delete_softly_by_id(&id).await?;
    Ok(success_ok(rows_affected))
}

pub async fn delete_permanently_by_id<T, S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Envelope<u64>, AppError>
where
    T: Entity,
    S: CrudService<T>,
{
    let rows_affected = service.delete_permanently_by_id(&id).await?;
    Ok(success_ok(rows_affected))
}
