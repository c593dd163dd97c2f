//! Entity CRUD routes for one entity type and its service.
//! Mount with `Router::nest("/widgets", crud_routes::<Widget, _>(service))`.

use crate::entity::Entity;
use crate::handlers::crud::{
    create, create_batch, delete_permanently_by_id, delete_softly_by_id, get_all, get_all_by_path_params,
    get_one_by_id, patch_by_id, update_by_id,
};
use crate::service::CrudService;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use validator::Validate;

/// `POST /` create, `POST /batch` batch create, `GET /` list, `PATCH /` patch one column,
/// `GET /:id` read, `PUT /:id` update, `DELETE /:id` soft delete, `DELETE /:id/permanent` permanent delete.
pub fn crud_routes<T, S>(service: Arc<S>) -> Router
where
    T: Entity + Validate,
    S: CrudService<T>,
{
    Router::new()
        .route(
            "/",
            get(get_all::<T, S>)
                .post(create::<T, S>)
                .patch(patch_by_id::<T, S>),
        )
        .route("/batch", post(create_batch::<T, S>))
        .route(
            "/:id",
            get(get_one_by_id::<T, S>)
                .put(update_by_id::<T, S>)
                .delete(delete_softly_by_id::<T, S>),
        )
        .route("/:id/permanent", delete(delete_permanently_by_id::<T, S>))
        .with_state(service)
}

/// A collection read filtered by every path parameter of `path`, e.g. `/widgets/by-client/:client_id`.
pub fn scoped_list_route<T, S>(path: &str, service: Arc<S>) -> Router
where
    T: Entity,
    S: CrudService<T>,
{
    Router::new()
        .route(path, get(get_all_by_path_params::<T, S>))
        .with_state(service)
}
