//! Widget service: a small API built from crudkit's generic routes.
//!
//! Run from repo root: `cargo run -p widget-service`
//! Apply `example_consumer/schema.sql` to the database first.

mod widget;

use axum::Router;
use crudkit::{
    common_routes_with_ready, connect, crud_routes, ensure_database_exists, init_tracing, scoped_list_route,
    with_body_limit, RepositoryService, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use widget::{Client, Widget};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing("crudkit=info,widget_service=info");

    ensure_database_exists(&settings.database_url).await?;
    let pool = connect(&settings).await?;

    let widgets = Arc::new(RepositoryService::<Widget>::new(pool.clone()).with_preloads(&["client"]));
    let clients = Arc::new(RepositoryService::<Client>::new(pool.clone()));

    let routes = Router::new()
        .merge(common_routes_with_ready(pool))
        .nest("/widgets", crud_routes::<Widget, _>(widgets.clone()))
        .nest("/clients", crud_routes::<Client, _>(clients))
        .merge(scoped_list_route::<Widget, _>("/widgets/by-client/:client_id", widgets));
    let app = with_body_limit(routes, settings.body_limit_bytes);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("widget service listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
