use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Prescription routes. Issuance is doctor-only (checked in the handler);
/// listing is role-scoped.
pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_prescription))
        .route("/", get(handlers::list_prescriptions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Medical record routes.
pub fn medical_record_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_medical_record))
        .route("/", get(handlers::list_medical_records))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
