//! waypoint-api — the HTTP surface of the session registry.
//!
//! Thin adapter layer: decode the request, pick the source IP, call the
//! lifecycle engine, map its typed outcomes onto status codes. All
//! decisions live in waypoint-services.

pub mod handlers;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/add", post(handlers::handle_announce))
        .route("/list", get(handlers::handle_list))
        .route("/list/{id}", get(handlers::handle_get))
        .route("/tunnel", get(handlers::handle_tunnel))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: ApiState, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await?;
    tracing::info!(addr = bind_addr, port, "registry API listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
