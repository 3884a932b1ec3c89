// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AppointmentError, CancelAppointmentRequest, CreateAppointmentRequest, DoctorActionRequest,
    JoinVideoQuery, ListAppointmentsQuery, ListReviewsQuery, SubmitReviewRequest,
};
use crate::services::{AppointmentBookingService, ReviewService};

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::PatientProfileNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::DoctorProfileNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken => AppError::Conflict(err.to_string()),
            AppointmentError::CannotCancel => AppError::NotFound(err.to_string()),
            AppointmentError::NotConfirmed => AppError::BadRequest(err.to_string()),
            AppointmentError::NoActiveSession => AppError::NotFound(err.to_string()),
            AppointmentError::ReviewExists => AppError::Conflict(err.to_string()),
            AppointmentError::NotParticipant => AppError::Forbidden(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.book_appointment(user_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let (appointments, total, page, limit) = service
        .list_appointments(user_id, user.role.as_deref(), &query, token)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "appointments": appointments,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages
            }
        }
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.cancel_appointment(user_id, request.appointment_id, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let (appointments, total, page, limit) = service
        .list_doctor_appointments(user_id, &query, token)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "appointments": appointments,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages
            }
        }
    })))
}

/// Doctor-side appointment mutations, dispatched on the request's action
/// field: complete, start-video, end-video.
#[axum::debug_handler]
pub async fn doctor_appointment_action(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DoctorActionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);

    match request.action.as_str() {
        "complete" => {
            let appointment = service
                .complete_appointment(user_id, request.appointment_id, token)
                .await?;
            Ok(Json(json!({ "success": true, "data": appointment })))
        }
        "start-video" => {
            let doctor = service.get_doctor_by_user(user_id, token).await?;
            let appointment = service
                .get_doctor_appointment(request.appointment_id, doctor.id, token)
                .await?;
            if appointment.status != crate::models::AppointmentStatus::Confirmed {
                return Err(AppointmentError::NotConfirmed.into());
            }
            let session = service.video().start_session(&appointment, token).await?;
            Ok(Json(json!({ "success": true, "data": session })))
        }
        "end-video" => {
            let doctor = service.get_doctor_by_user(user_id, token).await?;
            let appointment = service
                .get_doctor_appointment(request.appointment_id, doctor.id, token)
                .await?;
            let session = service.video().end_session(appointment.id, token).await?;
            Ok(Json(json!({ "success": true, "data": session })))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {}", other))),
    }
}

/// Join details for an appointment's active video session. Only the
/// appointment's patient or doctor may join.
#[axum::debug_handler]
pub async fn join_video_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<JoinVideoQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.get_appointment(query.appointment_id, token).await?;

    let is_participant = match user.role.as_deref() {
        Some("patient") => {
            let patient = service.get_patient_by_user(user_id, token).await?;
            patient.id == appointment.patient_id
        }
        Some("doctor") => {
            let doctor = service.get_doctor_by_user(user_id, token).await?;
            doctor.id == appointment.doctor_id
        }
        _ => false,
    };
    if !is_participant {
        return Err(AppointmentError::NotParticipant.into());
    }

    let session = service.video().get_joinable_session(appointment.id, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "roomId": session.room_id,
            "status": session.status,
            "startedAt": session.started_at
        }
    })))
}

#[axum::debug_handler]
pub async fn submit_review(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let booking = AppointmentBookingService::new(&state);
    let patient = booking.get_patient_by_user(user_id, token).await?;

    let service = ReviewService::new(Arc::new(SupabaseClient::new(&state)));
    let review = service.submit_review(patient.id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": review
    })))
}

#[axum::debug_handler]
pub async fn list_reviews(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<Value>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let service = ReviewService::new(Arc::new(SupabaseClient::new(&state)));
    let (reviews, total) = service
        .list_for_doctor(query.doctor_id, page, limit)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "reviews": reviews,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages
            }
        }
    })))
}
