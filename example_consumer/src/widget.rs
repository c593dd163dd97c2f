use chrono::{DateTime, Utc};
use crudkit::json::merge_dynamic_property;
use crudkit::{Column, Entity, Relation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

const CLIENT_COLUMNS: &[Column] = &[
    Column::new("id").typed("uuid").primary_key().with_default(),
    Column::new("name"),
    Column::new("created_at").typed("timestamptz").with_default(),
    Column::new("updated_at").typed("timestamptz").with_default(),
    Column::new("deleted_at").typed("timestamptz"),
];

impl Entity for Client {
    type Id = Uuid;
    const TABLE: &'static str = "clients";
    const CAMEL_CASE_JSON: bool = true;

    fn columns() -> &'static [Column] {
        CLIENT_COLUMNS
    }

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn merge(&mut self, incoming: Self) {
        self.name = incoming.name;
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub display_name: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub quantity: i64,
    /// Free-form properties; an update overlays the stored object instead of replacing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Preloaded owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
}

const WIDGET_COLUMNS: &[Column] = &[
    Column::new("id").typed("uuid").primary_key().with_default(),
    Column::new("client_id").typed("uuid"),
    Column::new("display_name"),
    Column::new("quantity").typed("bigint").with_default(),
    Column::new("attributes").typed("jsonb"),
    Column::new("created_at").typed("timestamptz").with_default(),
    Column::new("updated_at").typed("timestamptz").with_default(),
    Column::new("deleted_at").typed("timestamptz"),
];

const WIDGET_RELATIONS: &[Relation] = &[Relation::to_one("client", "clients", "client_id", "id").soft_deleted_by("deleted_at")];

impl Entity for Widget {
    type Id = Uuid;
    const TABLE: &'static str = "widgets";
    const CAMEL_CASE_JSON: bool = true;

    fn columns() -> &'static [Column] {
        WIDGET_COLUMNS
    }

    fn relations() -> &'static [Relation] {
        WIDGET_RELATIONS
    }

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn merge(&mut self, incoming: Self) {
        self.client_id = incoming.client_id;
        self.display_name = incoming.display_name;
        self.quantity = incoming.quantity;
        self.attributes = match incoming.attributes {
            Some(Value::Object(map)) => Some(Value::Object(merge_dynamic_property(self.attributes.as_ref(), map))),
            Some(other) => Some(other),
            None => self.attributes.take(),
        };
        self.client = None;
    }
}
