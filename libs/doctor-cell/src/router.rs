// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Public doctor browsing, mounted at /doctors.
pub fn doctors_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::browse_doctors))
        .with_state(state)
}

/// Doctor self-service profile, mounted at /doctor/me.
pub fn doctor_me_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_own_profile))
        .route("/", patch(handlers::update_own_profile))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
