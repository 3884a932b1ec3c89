use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use admin_cell::router::admin_routes;
use appointment_cell::router::{
    appointment_routes, doctor_appointment_routes, review_routes, video_routes,
};
use auth_cell::router::auth_routes;
use doctor_cell::router::{doctor_me_routes, doctors_routes};
use notification_cell::router::notification_routes;
use patient_cell::router::patient_me_routes;
use payment_cell::router::payment_routes;
use records_cell::router::{medical_record_routes, prescription_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Medilink API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctors_routes(state.clone()))
        .nest("/doctor/me", doctor_me_routes(state.clone()))
        .nest("/doctor/appointments", doctor_appointment_routes(state.clone()))
        .nest("/patient/me", patient_me_routes(state.clone()))
        .nest("/patient/prescriptions", prescription_routes(state.clone()))
        .nest("/patient/records", medical_record_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/appointments/reviews", review_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/video", video_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/admin", admin_routes(state))
}
