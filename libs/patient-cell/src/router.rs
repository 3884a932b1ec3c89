// libs/patient-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Patient self-service profile, mounted at /patient/me.
pub fn patient_me_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_own_profile))
        .route("/", patch(handlers::update_own_profile))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
