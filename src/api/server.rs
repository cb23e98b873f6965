use anyhow::Result;
use axum::{
    http::{
        header::{self, HeaderValue},
        Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::lifecycle::CrewLifecycleController;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CrewLifecycleController>,
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/stream", get(handlers::stream))
        .route("/update_factory_goal", post(handlers::update_factory_goal))
        .route(
            "/update_factory_backstory",
            post(handlers::update_factory_backstory),
        )
        .route("/get_factory_config", get(handlers::get_factory_config))
        .route("/restart_crew", post(handlers::restart_crew))
        .route("/api/team-status", get(handlers::team_status))
        .layer(cors_layer())
        // Every response advertises the same CORS policy, preflight or not.
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type,Authorization"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,PUT,POST,DELETE,OPTIONS"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let controller = state.controller.clone();
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    log::info!("Crew dashboard listening on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
