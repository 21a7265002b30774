//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Query endpoints stay open so end-user clients can poll for updates
    // without credentials; health is open for probes.
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/checkVersion", get(handlers::check_version))
        .route("/apps/latest", get(handlers::latest_release));

    // Everything else requires a bearer token
    let protected_routes = Router::new()
        .route("/listApps", get(handlers::list_apps))
        .route("/listChannels", get(handlers::list_channels))
        .route("/listPlatforms", get(handlers::list_platforms))
        .route("/listArchs", get(handlers::list_archs))
        .route("/createApp", post(handlers::create_app))
        .route("/createChannel", post(handlers::create_channel))
        .route("/createPlatform", post(handlers::create_platform))
        .route("/createArch", post(handlers::create_arch))
        .route("/updateApp", post(handlers::update_app))
        .route("/updateChannel", post(handlers::update_channel))
        .route("/updatePlatform", post(handlers::update_platform))
        .route("/updateArch", post(handlers::update_arch))
        .route("/deleteApp", delete(handlers::delete_app))
        .route("/deleteChannel", delete(handlers::delete_channel))
        .route("/deletePlatform", delete(handlers::delete_platform))
        .route("/deleteArch", delete(handlers::delete_arch))
        .route("/upload", post(handlers::upload_release))
        .route("/apps/update", post(handlers::update_release))
        .route("/apps/delete", delete(handlers::delete_release))
        .route("/search", get(handlers::search_releases))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Every handler runs under the request deadline; uploads are bounded by
    // the body limit rather than axum's 2 MiB default.
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
