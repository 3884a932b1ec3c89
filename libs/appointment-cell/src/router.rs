use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Patient-facing appointment routes, all authenticated.
pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/", patch(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Doctor-side appointment management.
pub fn doctor_appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctor_appointments))
        .route("/", patch(handlers::doctor_appointment_action))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Video session join endpoint for appointment participants.
pub fn video_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::join_video_session))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Reviews: submission is authenticated, listing is public.
pub fn review_routes(state: Arc<AppConfig>) -> Router {
    let submit = Router::new()
        .route("/", post(handlers::submit_review))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let list = Router::new()
        .route("/", get(handlers::list_reviews))
        .with_state(state);

    submit.merge(list)
}
