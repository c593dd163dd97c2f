//! Routers: generic entity CRUD and service health.

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub mod common;
pub mod crud;
pub use common::{common_routes, common_routes_with_ready};
pub use crud::{crud_routes, scoped_list_route};

/// Reject request bodies over `limit` bytes with 413 before any handler runs.
pub fn with_body_limit(router: Router, limit: usize) -> Router {
    router.layer(RequestBodyLimitLayer::new(limit))
}
