use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Payment routes. The PATCH settlement callback stays outside the auth
/// middleware; everything else requires a session.
pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let authenticated = Router::new()
        .route("/", post(handlers::initiate_payment))
        .route("/", get(handlers::list_payments))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let webhook = Router::new()
        .route("/", patch(handlers::confirm_payment))
        .with_state(state);

    authenticated.merge(webhook)
}
