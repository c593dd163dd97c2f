//! Generic CRUD execution against PostgreSQL for any `Entity`.

use crate::case::{object_keys_to_snake_case, row_keys_to_camel_case, to_snake_case};
use crate::entity::Entity;
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::sql::{self, PgBindValue, QueryBuf, Table};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::marker::PhantomData;

pub struct Repository<T> {
    pool: PgPool,
    table: Table,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            pool: self.pool.clone(),
            table: self.table,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(pool: PgPool) -> Self {
        Repository {
            pool,
            table: Table::of::<T>(),
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert one record and return it as stored (with generated id and defaults).
    pub async fn create(&self, entity: &T) -> Result<T, AppError> {
        tracing::info!(table = T::TABLE, "creating a new record");
        let q = sql::insert(&self.table, &to_row(entity)?);
        let created = fetch_optional(&self.pool, &q)
            .await
            .map_err(|e| {
                tracing::debug!(table = T::TABLE, error = %e, "failed to create");
                e
            })?
            .map(|row| decode_row::<T>(&row))
            .transpose()?;
        match created {
            Some(created) if created.is_persisted() => {
                log_saved(&created);
                Ok(created)
            }
            _ => {
                tracing::debug!(table = T::TABLE, "not saved");
                Err(AppError::NotSaved)
            }
        }
    }

    /// Insert many records in one transaction. An empty batch inserts nothing.
    pub async fn create_batch(&self, entities: &[T]) -> Result<Vec<T>, AppError> {
        tracing::info!(table = T::TABLE, count = entities.len(), "creating records in batch");
        if entities.is_empty() {
            tracing::warn!(table = T::TABLE, "not saved: empty batch");
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(entities.len());
        let mut tx = self.pool.begin().await?;
        for entity in entities {
            let q = sql::insert(&self.table, &to_row(entity)?);
            let created = fetch_optional(&mut *tx, &q)
                .await?
                .map(|row| decode_row::<T>(&row))
                .transpose()?
                .filter(|c| c.is_persisted())
                .ok_or_else(|| {
                    tracing::debug!(table = T::TABLE, "failed to create in batch");
                    AppError::NotSaved
                })?;
            log_saved(&created);
            out.push(created);
        }
        tx.commit().await?;
        Ok(out)
    }

    /// One page of live records.
    pub async fn get_all(&self, pagination: &Pagination, preloads: &[&str]) -> Result<Vec<T>, AppError> {
        self.get_all_by_fields(&[], pagination, preloads).await
    }

    /// One page of live records matching every `(column, value)` filter.
    pub async fn get_all_by_fields(
        &self,
        filters: &[(String, Value)],
        pagination: &Pagination,
        preloads: &[&str],
    ) -> Result<Vec<T>, AppError> {
        let (offset, limit) = pagination.offset_limit();
        tracing::info!(table = T::TABLE, offset, limit, filters = filters.len(), "retrieving collection");
        let q = sql::select_list(&self.table, filters, pagination, preloads)?;
        let rows = fetch_all(&self.pool, &q).await.map_err(|e| {
            tracing::debug!(table = T::TABLE, error = %e, "failed to retrieve");
            e
        })?;
        rows.iter().map(decode_row::<T>).collect()
    }

    pub async fn get_one_by_id(&self, id: &str, preloads: &[&str]) -> Result<Option<T>, AppError> {
        tracing::info!(table = T::TABLE, id, "retrieving single row by id");
        let q = sql::select_by_id(&self.table, id, false, preloads)?;
        self.fetch_one_row(&q).await
    }

    /// Like `get_one_by_id` but also returns soft-deleted rows.
    pub async fn get_one_including_deleted_by_id(&self, id: &str, preloads: &[&str]) -> Result<Option<T>, AppError> {
        tracing::info!(table = T::TABLE, id, "retrieving single row by id, including deleted");
        let q = sql::select_by_id(&self.table, id, true, preloads)?;
        self.fetch_one_row(&q).await
    }

    /// First live record matching all filters; `NotFound` when none has an id.
    pub async fn get_one_by_fields(&self, filters: &[(String, Value)]) -> Result<T, AppError> {
        tracing::info!(table = T::TABLE, filters = ?filters, "retrieving single row by values");
        let q = sql::select_first_by_fields(&self.table, filters)?;
        self.fetch_one_row(&q)
            .await?
            .filter(|row| row.is_persisted())
            .ok_or_else(|| {
                tracing::info!(table = T::TABLE, "record not found");
                AppError::NotFound("record not found".into())
            })
    }

    /// Update a single column. `column_name` may be in any case; it is converted to snake_case.
    pub async fn patch_by_id(&self, id: &str, column_name: &str, value: &Value) -> Result<T, AppError> {
        let column = to_snake_case(column_name);
        tracing::info!(table = T::TABLE, id, column = %column, "patching column");
        if self.get_one_by_id(id, &[]).await?.is_none() {
            tracing::debug!(table = T::TABLE, id, "not patched: no live record");
            return Err(AppError::NotPatched);
        }
        let q = sql::patch(&self.table, id, &column, value)?;
        let patched = fetch_optional(&self.pool, &q).await.map_err(|e| {
            tracing::debug!(table = T::TABLE, id, error = %e, "failed to patch");
            e
        })?;
        match patched {
            Some(row) => decode_row::<T>(&row),
            None => {
                tracing::debug!(table = T::TABLE, id, "not patched: affected rows: 0");
                Err(AppError::NotPatched)
            }
        }
    }

    /// Merge `incoming` onto the stored record via `Entity::merge` and persist the result.
    pub async fn update_by_id(&self, id: &str, incoming: T) -> Result<T, AppError> {
        tracing::info!(table = T::TABLE, id, "updating row by id");
        let Some(mut existing) = self.get_one_by_id(id, &[]).await? else {
            tracing::debug!(table = T::TABLE, id, "not updated: no live record");
            return Err(AppError::NotUpdated);
        };
        existing.merge(incoming);
        let q = sql::update(&self.table, id, &to_row(&existing)?);
        let updated = fetch_optional(&self.pool, &q).await.map_err(|e| {
            tracing::debug!(table = T::TABLE, id, error = %e, "failed to update");
            e
        })?;
        match updated {
            Some(row) => decode_row::<T>(&row),
            None => {
                tracing::debug!(table = T::TABLE, id, "not updated: affected rows: 0");
                Err(AppError::NotUpdated)
            }
        }
    }

    /// Logical delete. Entities without a soft-delete column are deleted physically.
    pub async fn delete_soft_by_id(&self, id: &str) -> Result<u64, AppError> {
        tracing::info!(table = T::TABLE, id, "soft deleting row");
        self.require_record(id, false).await?;
        let q = sql::soft_delete(&self.table, id).unwrap_or_else(|| sql::delete(&self.table, id, false));
        self.delete_with(id, &q).await
    }

    /// Physical delete of a live row; soft-deleted rows are not matched.
    pub async fn delete_hard_by_id(&self, id: &str) -> Result<u64, AppError> {
        tracing::info!(table = T::TABLE, id, "hard deleting row");
        self.require_record(id, false).await?;
        let q = sql::delete(&self.table, id, false);
        self.delete_with(id, &q).await
    }

    /// Physical delete bypassing the soft-delete convention (removes previously soft-deleted rows too).
    pub async fn delete_permanent_by_id(&self, id: &str) -> Result<u64, AppError> {
        tracing::info!(table = T::TABLE, id, "permanently deleting row");
        self.require_record(id, true).await?;
        let q = sql::delete(&self.table, id, true);
        self.delete_with(id, &q).await
    }

    async fn require_record(&self, id: &str, include_deleted: bool) -> Result<(), AppError> {
        let found = if include_deleted {
            self.get_one_including_deleted_by_id(id, &[]).await?
        } else {
            self.get_one_by_id(id, &[]).await?
        };
        match found {
            Some(row) if row.is_persisted() => Ok(()),
            _ => {
                let msg = format!("no record found with id: {}", id);
                tracing::debug!(table = T::TABLE, "{}", msg);
                Err(AppError::NotDeleted(msg))
            }
        }
    }

    async fn delete_with(&self, id: &str, q: &QueryBuf) -> Result<u64, AppError> {
        let affected = execute(&self.pool, q).await.map_err(|e| {
            tracing::debug!(table = T::TABLE, id, error = %e, "failed to delete row by id");
            e
        })?;
        if affected == 0 {
            tracing::debug!(table = T::TABLE, id, "number of rows deleted: 0");
            return Err(AppError::NotDeleted(format!("failed to delete row by id: {}", id)));
        }
        Ok(affected)
    }

    async fn fetch_one_row(&self, q: &QueryBuf) -> Result<Option<T>, AppError> {
        let row = fetch_optional(&self.pool, q).await.map_err(|e| {
            tracing::debug!(table = T::TABLE, error = %e, "failed to retrieve");
            e
        })?;
        row.map(|r| decode_row::<T>(&r)).transpose()
    }
}

fn log_saved<T: Entity>(created: &T) {
    if let Some(id) = created.id() {
        tracing::info!(table = T::TABLE, id = %id, "saved to database");
    }
}

/// Entity -> column map (snake_case keys).
fn to_row<T: Entity>(entity: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(entity)? {
        Value::Object(mut map) => {
            if T::CAMEL_CASE_JSON {
                object_keys_to_snake_case(&mut map);
            }
            Ok(map)
        }
        _ => Err(AppError::Json(<serde_json::Error as serde::ser::Error>::custom(format!(
            "{} must serialize to a JSON object",
            T::TABLE
        )))),
    }
}

fn decode_row<T: Entity>(row: &PgRow) -> Result<T, AppError> {
    let mut map = row_to_map(row);
    if T::CAMEL_CASE_JSON {
        let preloaded: Vec<&str> = T::relations().iter().map(|r| r.name).collect();
        row_keys_to_camel_case(&mut map, &preloaded);
    }
    Ok(serde_json::from_value(Value::Object(map))?)
}

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: &[PgBindValue]) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(p.clone());
    }
    query
}

async fn fetch_optional<'c, E>(executor: E, q: &QueryBuf) -> Result<Option<PgRow>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    Ok(bind_all(sqlx::query(&q.sql), &q.params).fetch_optional(executor).await?)
}

async fn fetch_all<'c, E>(executor: E, q: &QueryBuf) -> Result<Vec<PgRow>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    Ok(bind_all(sqlx::query(&q.sql), &q.params).fetch_all(executor).await?)
}

async fn execute<'c, E>(executor: E, q: &QueryBuf) -> Result<u64, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let result = bind_all(sqlx::query(&q.sql), &q.params).execute(executor).await?;
    tracing::info!(rows_affected = result.rows_affected(), "rows affected");
    Ok(result.rows_affected())
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
