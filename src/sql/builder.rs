//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from entity metadata.
//! Identifiers only come from declared columns and relations; values are always parameters.

use crate::entity::{Column, Entity, Relation, RelationKind};
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";
const UPDATED_AT: &str = "updated_at";

/// Table metadata of one entity type, detached from the type so the builder stays non-generic.
#[derive(Clone, Copy, Debug)]
pub struct Table {
    pub schema: &'static str,
    pub name: &'static str,
    pub id_column: &'static str,
    pub soft_delete_column: Option<&'static str>,
    pub columns: &'static [Column],
    pub relations: &'static [Relation],
}

impl Table {
    pub fn of<T: Entity>() -> Self {
        Table {
            schema: T::SCHEMA,
            name: T::TABLE,
            id_column: T::ID_COLUMN,
            soft_delete_column: T::SOFT_DELETE_COLUMN,
            columns: T::columns(),
            relations: T::relations(),
        }
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn id_pg_type(&self) -> Option<&'static str> {
        self.column(self.id_column).and_then(|c| c.pg_type)
    }

    fn has_updated_at(&self) -> bool {
        self.column(UPDATED_AT).is_some()
    }
}

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

fn placeholder(n: u32, pg_type: Option<&str>) -> String {
    pg_type
        .map(|t| format!("${}::{}", n, t))
        .unwrap_or_else(|| format!("${}", n))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: &Value, pg_type: Option<&str>) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(PgBindValue::for_column(v, pg_type));
        n
    }

    fn push_id(&mut self, table: &Table, id: &str) -> String {
        let n = self.params.len() as u32 + 1;
        self.params.push(PgBindValue::String(id.to_string()));
        placeholder(n, table.id_pg_type())
    }
}

/// Column expression: custom enum (schema.typename) and numeric are read as text so rows decode to JSON.
fn column_expr(c: &Column, alias: Option<&str>) -> String {
    let q = quoted(c.name);
    let qualified = alias.map(|a| format!("{}.{}", a, q)).unwrap_or_else(|| q.clone());
    let pg_type = c.pg_type.unwrap_or("");
    if pg_type.contains('.') || pg_type == "numeric" {
        format!("{}::text AS {}", qualified, q)
    } else if alias.is_some() {
        format!("{} AS {}", qualified, q)
    } else {
        qualified
    }
}

fn select_column_list(table: &Table, alias: Option<&str>) -> String {
    table
        .columns
        .iter()
        .map(|c| column_expr(c, alias))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One scalar subquery per preload: row_to_json for to_one, json_agg for to_many.
fn preload_selects(table: &Table, preloads: &[&str]) -> Result<Vec<String>, AppError> {
    preloads
        .iter()
        .map(|name| {
            let rel = table
                .relations
                .iter()
                .find(|r| r.name == *name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown association: {}", name)))?;
            let rel_table = qualified_table(rel.schema, rel.table);
            let mut cond = format!(
                "sub.{} = {}.{}",
                quoted(rel.their_key),
                MAIN_ALIAS,
                quoted(rel.our_key)
            );
            if let Some(col) = rel.soft_delete_column {
                cond.push_str(&format!(" AND sub.{} IS NULL", quoted(col)));
            }
            let subquery = match rel.kind {
                RelationKind::ToOne => format!(
                    "(SELECT row_to_json(sub) FROM {} sub WHERE {} LIMIT 1)",
                    rel_table, cond
                ),
                RelationKind::ToMany => format!(
                    "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM {} sub WHERE {})",
                    rel_table, cond
                ),
            };
            Ok(format!("{} AS {}", subquery, quoted(rel.name)))
        })
        .collect()
}

fn select_head(table: &Table, preloads: &[&str]) -> Result<String, AppError> {
    let mut parts = vec![select_column_list(table, Some(MAIN_ALIAS))];
    parts.extend(preload_selects(table, preloads)?);
    Ok(format!(
        "SELECT {} FROM {} {}",
        parts.join(", "),
        qualified_table(table.schema, table.name),
        MAIN_ALIAS
    ))
}

fn live_rows_only(table: &Table, alias: Option<&str>) -> Option<String> {
    table.soft_delete_column.map(|col| match alias {
        Some(a) => format!("{}.{} IS NULL", a, quoted(col)),
        None => format!("{} IS NULL", quoted(col)),
    })
}

/// Equality filters on declared columns; a null value matches IS NULL.
fn push_filters(q: &mut QueryBuf, table: &Table, filters: &[(String, Value)]) -> Result<Vec<String>, AppError> {
    let mut where_parts = Vec::with_capacity(filters.len());
    for (col, val) in filters {
        let c = table
            .column(col)
            .ok_or_else(|| AppError::BadRequest(format!("unknown column: {}", col)))?;
        let lhs = format!("{}.{}", MAIN_ALIAS, quoted(c.name));
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", lhs));
        } else {
            let n = q.push_param(val, c.pg_type);
            where_parts.push(format!("{} = {}", lhs, placeholder(n, c.pg_type)));
        }
    }
    Ok(where_parts)
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(table: &Table, pagination: &Pagination) -> Result<String, AppError> {
    let keys = pagination.sort_keys()?;
    if keys.is_empty() {
        return Ok(format!(" ORDER BY {}.{}", MAIN_ALIAS, quoted(table.id_column)));
    }
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        if table.column(&key.column).is_none() {
            return Err(AppError::BadRequest(format!("unknown sort column: {}", key.column)));
        }
        items.push(format!("{}.{} {}", MAIN_ALIAS, quoted(&key.column), key.direction.as_sql()));
    }
    Ok(format!(" ORDER BY {}", items.join(", ")))
}

/// Reject ids that cannot be cast to the id column's type.
pub fn check_id(table: &Table, id: &str) -> Result<(), AppError> {
    let valid = match table.id_pg_type().map(str::to_ascii_lowercase).as_deref() {
        Some("uuid") => uuid::Uuid::parse_str(id.trim()).is_ok(),
        Some("smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8") => id.trim().parse::<i64>().is_ok(),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("invalid id: {}", id)))
    }
}

/// SELECT by id. `include_deleted` also matches soft-deleted rows.
pub fn select_by_id(table: &Table, id: &str, include_deleted: bool, preloads: &[&str]) -> Result<QueryBuf, AppError> {
    check_id(table, id)?;
    let mut q = QueryBuf::new();
    let head = select_head(table, preloads)?;
    let ph = q.push_id(table, id);
    let mut where_parts = vec![format!("{}.{} = {}", MAIN_ALIAS, quoted(table.id_column), ph)];
    if !include_deleted {
        where_parts.extend(live_rows_only(table, Some(MAIN_ALIAS)));
    }
    q.sql = format!("{}{}", head, where_clause(&where_parts));
    Ok(q)
}

/// Paginated SELECT of live rows with optional equality filters and preloads.
pub fn select_list(
    table: &Table,
    filters: &[(String, Value)],
    pagination: &Pagination,
    preloads: &[&str],
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let head = select_head(table, preloads)?;
    let mut where_parts = push_filters(&mut q, table, filters)?;
    where_parts.extend(live_rows_only(table, Some(MAIN_ALIAS)));
    let order = order_clause(table, pagination)?;
    let (offset, limit) = pagination.offset_limit();
    q.sql = format!(
        "{}{}{} LIMIT {} OFFSET {}",
        head,
        where_clause(&where_parts),
        order,
        limit,
        offset
    );
    Ok(q)
}

/// First live row matching all filters, ordered by id.
pub fn select_first_by_fields(table: &Table, filters: &[(String, Value)]) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let head = select_head(table, &[])?;
    let mut where_parts = push_filters(&mut q, table, filters)?;
    where_parts.extend(live_rows_only(table, Some(MAIN_ALIAS)));
    q.sql = format!(
        "{}{} ORDER BY {}.{} LIMIT 1",
        head,
        where_clause(&where_parts),
        MAIN_ALIAS,
        quoted(table.id_column)
    );
    Ok(q)
}

/// INSERT: declared columns with values from `row` (snake_case keys).
/// Columns with a DB default are omitted when the row has no value for them, so the DB fills them.
pub fn insert(table: &Table, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in table.columns {
        let val = row.get(c.name).filter(|v| !v.is_null()).cloned();
        if val.is_none() && (c.has_default || c.primary_key) {
            continue;
        }
        let n = q.push_param(&val.unwrap_or(Value::Null), c.pg_type);
        cols.push(quoted(c.name));
        placeholders.push(placeholder(n, c.pg_type));
    }
    let target = qualified_table(table.schema, table.name);
    let returning = select_column_list(table, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE of a live row: SET every declared column present in `row` except the id,
/// the soft-delete marker and updated_at (which is set to NOW()).
pub fn update(table: &Table, id: &str, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in table.columns {
        if c.name == table.id_column || Some(c.name) == table.soft_delete_column || c.name == UPDATED_AT {
            continue;
        }
        let Some(v) = row.get(c.name) else { continue };
        let n = q.push_param(v, c.pg_type);
        sets.push(format!("{} = {}", quoted(c.name), placeholder(n, c.pg_type)));
    }
    if table.has_updated_at() {
        sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    }
    if sets.is_empty() {
        sets.push(format!("{0} = {0}", quoted(table.id_column)));
    }
    finish_update(q, table, id, sets)
}

/// UPDATE of a single column. `column` must already be in storage naming.
pub fn patch(table: &Table, id: &str, column: &str, value: &Value) -> Result<QueryBuf, AppError> {
    let c = table
        .column(column)
        .ok_or_else(|| AppError::BadRequest(format!("unknown column: {}", column)))?;
    if c.name == table.id_column || Some(c.name) == table.soft_delete_column {
        return Err(AppError::BadRequest(format!("column cannot be patched: {}", column)));
    }
    let mut q = QueryBuf::new();
    let n = q.push_param(value, c.pg_type);
    let mut sets = vec![format!("{} = {}", quoted(c.name), placeholder(n, c.pg_type))];
    if table.has_updated_at() && c.name != UPDATED_AT {
        sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    }
    Ok(finish_update(q, table, id, sets))
}

fn finish_update(mut q: QueryBuf, table: &Table, id: &str, sets: Vec<String>) -> QueryBuf {
    let ph = q.push_id(table, id);
    let mut where_parts = vec![format!("{} = {}", quoted(table.id_column), ph)];
    where_parts.extend(live_rows_only(table, None));
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        qualified_table(table.schema, table.name),
        sets.join(", "),
        where_clause(&where_parts),
        select_column_list(table, None)
    );
    q
}

/// Logical delete: stamp the soft-delete column. Returns None when the table has no such column.
pub fn soft_delete(table: &Table, id: &str) -> Option<QueryBuf> {
    let col = table.soft_delete_column?;
    let mut q = QueryBuf::new();
    let ph = q.push_id(table, id);
    q.sql = format!(
        "UPDATE {} SET {} = NOW() WHERE {} = {} AND {} IS NULL",
        qualified_table(table.schema, table.name),
        quoted(col),
        quoted(table.id_column),
        ph,
        quoted(col)
    );
    Some(q)
}

/// Physical DELETE by id. Without `include_deleted`, soft-deleted rows are left alone.
pub fn delete(table: &Table, id: &str, include_deleted: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_id(table, id);
    let mut where_parts = vec![format!("{} = {}", quoted(table.id_column), ph)];
    if !include_deleted {
        where_parts.extend(live_rows_only(table, None));
    }
    q.sql = format!(
        "DELETE FROM {}{}",
        qualified_table(table.schema, table.name),
        where_clause(&where_parts)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::new("id").typed("uuid").primary_key().with_default(),
        Column::new("name").typed("text"),
        Column::new("price").typed("numeric"),
        Column::new("client_id").typed("uuid"),
        Column::new("created_at").typed("timestamptz").with_default(),
        Column::new("updated_at").typed("timestamptz").with_default(),
        Column::new("deleted_at").typed("timestamptz"),
    ];
    const RELATIONS: &[Relation] = &[
        Relation::to_one("client", "clients", "client_id", "id"),
        Relation::to_many("parts", "parts", "id", "widget_id").soft_deleted_by("deleted_at"),
    ];

    const ID: &str = "2b1e8e4e-3d5f-4a3c-9d59-6f1c1a0d7e11";

    fn widgets() -> Table {
        Table {
            schema: "public",
            name: "widgets",
            id_column: "id",
            soft_delete_column: Some("deleted_at"),
            columns: COLUMNS,
            relations: RELATIONS,
        }
    }

    #[test]
    fn list_applies_pagination_and_live_filter() {
        let q = select_list(&widgets(), &[], &Pagination::new(20, 3, ""), &[]).unwrap();
        assert!(q.sql.starts_with("SELECT main.\"id\" AS \"id\", main.\"name\" AS \"name\", main.\"price\"::text AS \"price\""));
        assert!(q.sql.contains("FROM \"public\".\"widgets\" main WHERE main.\"deleted_at\" IS NULL"));
        assert!(q.sql.ends_with(" ORDER BY main.\"id\" LIMIT 20 OFFSET 40"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn list_with_filters_sort_and_preloads() {
        let filters = vec![
            ("client_id".to_string(), json!("7d1a6f0e-1f0a-4c1b-8a55-5d7c2f6b9a10")),
            ("name".to_string(), Value::Null),
        ];
        let q = select_list(&widgets(), &filters, &Pagination::new(0, 0, "name desc"), &["client", "parts"]).unwrap();
        assert!(q.sql.contains("main.\"client_id\" = $1::uuid AND main.\"name\" IS NULL AND main.\"deleted_at\" IS NULL"));
        assert!(q.sql.contains("(SELECT row_to_json(sub) FROM \"public\".\"clients\" sub WHERE sub.\"id\" = main.\"client_id\" LIMIT 1) AS \"client\""));
        assert!(q.sql.contains("json_agg(row_to_json(sub)), '[]'::json) FROM \"public\".\"parts\" sub WHERE sub.\"widget_id\" = main.\"id\" AND sub.\"deleted_at\" IS NULL) AS \"parts\""));
        assert!(q.sql.ends_with(" ORDER BY main.\"name\" DESC LIMIT 10 OFFSET 0"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        let t = widgets();
        assert!(select_list(&t, &[("nope".into(), json!(1))], &Pagination::default(), &[]).is_err());
        assert!(select_list(&t, &[], &Pagination::new(0, 0, "nope"), &[]).is_err());
        assert!(select_list(&t, &[], &Pagination::default(), &["nope"]).is_err());
        assert!(patch(&t, "x", "nope", &json!(1)).is_err());
        assert!(patch(&t, "x", "id", &json!(1)).is_err());
    }

    #[test]
    fn select_by_id_with_and_without_deleted() {
        let live = select_by_id(&widgets(), ID, false, &[]).unwrap();
        assert!(live.sql.ends_with("WHERE main.\"id\" = $1::uuid AND main.\"deleted_at\" IS NULL"));
        assert_eq!(live.params, vec![PgBindValue::String(ID.into())]);
        let any = select_by_id(&widgets(), ID, true, &[]).unwrap();
        assert!(any.sql.ends_with("WHERE main.\"id\" = $1::uuid"));
    }

    #[test]
    fn insert_omits_defaulted_columns_without_values() {
        let row = json!({"id": null, "name": "bolt", "price": "1.50", "client_id": null, "deleted_at": null});
        let q = insert(&widgets(), row.as_object().unwrap());
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"widgets\" (\"name\", \"price\", \"client_id\", \"deleted_at\") VALUES ($1::text, $2::numeric, $3::uuid, $4::timestamptz) RETURNING "
        ));
        assert_eq!(
            q.params,
            vec![
                PgBindValue::String("bolt".into()),
                PgBindValue::String("1.50".into()),
                PgBindValue::Null,
                PgBindValue::Null
            ]
        );
    }

    #[test]
    fn update_sets_columns_and_touches_updated_at() {
        let row = json!({"id": "abc", "name": "nut", "created_at": "2024-01-01T00:00:00Z", "updated_at": "x", "deleted_at": null});
        let q = update(&widgets(), "abc", row.as_object().unwrap());
        assert!(q.sql.starts_with(
            "UPDATE \"public\".\"widgets\" SET \"name\" = $1::text, \"created_at\" = $2::timestamptz, \"updated_at\" = NOW() WHERE \"id\" = $3::uuid AND \"deleted_at\" IS NULL RETURNING "
        ));
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn patch_touches_one_column() {
        let q = patch(&widgets(), "abc", "name", &json!("washer")).unwrap();
        assert!(q.sql.starts_with(
            "UPDATE \"public\".\"widgets\" SET \"name\" = $1::text, \"updated_at\" = NOW() WHERE \"id\" = $2::uuid AND \"deleted_at\" IS NULL"
        ));
        assert_eq!(q.params, vec![PgBindValue::String("washer".into()), PgBindValue::String("abc".into())]);
    }

    #[test]
    fn delete_variants() {
        let t = widgets();
        let soft = soft_delete(&t, "abc").unwrap();
        assert_eq!(
            soft.sql,
            "UPDATE \"public\".\"widgets\" SET \"deleted_at\" = NOW() WHERE \"id\" = $1::uuid AND \"deleted_at\" IS NULL"
        );
        assert_eq!(
            delete(&t, "abc", false).sql,
            "DELETE FROM \"public\".\"widgets\" WHERE \"id\" = $1::uuid AND \"deleted_at\" IS NULL"
        );
        assert_eq!(delete(&t, "abc", true).sql, "DELETE FROM \"public\".\"widgets\" WHERE \"id\" = $1::uuid");

        let hard_only = Table { soft_delete_column: None, ..t };
        assert!(soft_delete(&hard_only, "abc").is_none());
    }

    #[test]
    fn ids_must_fit_the_id_column() {
        let t = widgets();
        assert!(matches!(select_by_id(&t, "not-a-uuid", false, &[]), Err(AppError::BadRequest(_))));
        assert!(check_id(&t, ID).is_ok());

        const SERIAL: &[Column] = &[Column::new("id").typed("bigint").primary_key().with_default()];
        let serial = Table { columns: SERIAL, ..t };
        assert!(check_id(&serial, "42").is_ok());
        assert!(check_id(&serial, "4x2").is_err());

        const UNTYPED: &[Column] = &[Column::new("id").primary_key()];
        assert!(check_id(&Table { columns: UNTYPED, ..t }, "anything").is_ok());
    }

    #[test]
    fn jsonb_columns_bind_documents() {
        const DOCS: &[Column] = &[
            Column::new("id").typed("uuid").primary_key().with_default(),
            Column::new("attributes").typed("jsonb"),
        ];
        let t = Table {
            columns: DOCS,
            relations: &[],
            ..widgets()
        };
        let q = insert(&t, json!({"attributes": "blue"}).as_object().unwrap());
        assert!(q.sql.contains("(\"attributes\") VALUES ($1::jsonb)"));
        assert_eq!(q.params, vec![PgBindValue::Json(json!("blue"))]);

        let q = patch(&t, ID, "attributes", &json!(5)).unwrap();
        assert_eq!(q.params[0], PgBindValue::Json(json!(5)));
    }
}
