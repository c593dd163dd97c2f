//! The capability an application record type provides to the generic layer: table metadata,
//! an identifier accessor, and an explicit merge used by update-by-id.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;

/// A column of the entity's table. `pg_type` is used for SQL casts (e.g. `$1::uuid`) so that
/// JSON-derived parameters bind to the column's real type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub pg_type: Option<&'static str>,
    pub primary_key: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()); omitted from INSERT when absent.
    pub has_default: bool,
}

impl Column {
    pub const fn new(name: &'static str) -> Self {
        Column {
            name,
            pg_type: None,
            primary_key: false,
            has_default: false,
        }
    }

    pub const fn typed(mut self, pg_type: &'static str) -> Self {
        self.pg_type = Some(pg_type);
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Direction of an association: to_one (we hold the key to them) or to_many (they hold a key to us).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    ToOne,
    ToMany,
}

/// An association that can be eagerly loaded ("preloaded") alongside the entity.
/// It is selected as a JSON object (to_one) or array (to_many) under `name`.
#[derive(Clone, Copy, Debug)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub schema: &'static str,
    pub table: &'static str,
    /// Our column used in the join (our FK for to_one; our PK for to_many).
    pub our_key: &'static str,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub their_key: &'static str,
    pub soft_delete_column: Option<&'static str>,
}

impl Relation {
    pub const fn to_one(name: &'static str, table: &'static str, our_key: &'static str, their_key: &'static str) -> Self {
        Relation {
            name,
            kind: RelationKind::ToOne,
            schema: "public",
            table,
            our_key,
            their_key,
            soft_delete_column: None,
        }
    }

    pub const fn to_many(name: &'static str, table: &'static str, our_key: &'static str, their_key: &'static str) -> Self {
        Relation {
            name,
            kind: RelationKind::ToMany,
            schema: "public",
            table,
            our_key,
            their_key,
            soft_delete_column: None,
        }
    }

    pub const fn in_schema(mut self, schema: &'static str) -> Self {
        self.schema = schema;
        self
    }

    pub const fn soft_deleted_by(mut self, column: &'static str) -> Self {
        self.soft_delete_column = Some(column);
        self
    }
}

pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    type Id: Display + Send + Sync;

    const SCHEMA: &'static str = "public";
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Logical-delete timestamp column. `None` makes every delete physical.
    const SOFT_DELETE_COLUMN: Option<&'static str> = Some("deleted_at");
    /// Set when the type serializes its fields in camelCase; keys are mapped to snake_case columns and back.
    const CAMEL_CASE_JSON: bool = false;

    fn columns() -> &'static [Column];

    fn relations() -> &'static [Relation] {
        &[]
    }

    fn id(&self) -> Option<&Self::Id>;

    /// Copy the fields of `incoming` that an update may change onto `self`.
    /// Implementations keep `self`'s identifier and bookkeeping columns.
    fn merge(&mut self, incoming: Self);

    /// True once the identifier is present and not blank.
    fn is_persisted(&self) -> bool {
        self.id()
            .map(|id| !id.to_string().trim().is_empty())
            .unwrap_or(false)
    }

    fn column(name: &str) -> Option<&'static Column> {
        Self::columns().iter().find(|c| c.name == name)
    }

    fn relation(name: &str) -> Option<&'static Relation> {
        Self::relations().iter().find(|r| r.name == name)
    }
}
