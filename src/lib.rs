//! crudkit: generic CRUD handlers and a generic repository for axum services over PostgreSQL.

pub mod case;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod json;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;

pub use config::Settings;
pub use db::{connect, ensure_database_exists};
pub use entity::{Column, Entity, Relation, RelationKind};
pub use error::{AppError, ConfigError};
pub use extractors::{ValidatedBatch, ValidatedJson};
pub use logging::init_tracing;
pub use models::PatchByIdRequest;
pub use pagination::Pagination;
pub use repository::Repository;
pub use response::{set_response, Envelope};
pub use routes::{common_routes, common_routes_with_ready, crud_routes, scoped_list_route, with_body_limit};
pub use service::{CrudService, RepositoryService};
