use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Admin surface. Role enforcement happens in the handlers; the
/// middleware only establishes identity.
pub fn admin_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/doctors", get(handlers::list_doctors))
        .route("/doctors", patch(handlers::review_doctor))
        .route("/users", get(handlers::list_users))
        .route("/users", patch(handlers::moderate_user))
        .route("/analytics", get(handlers::get_analytics))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
