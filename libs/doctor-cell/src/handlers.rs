// libs/doctor-cell/src/handlers.rs
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
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{BrowseDoctorsQuery, DoctorError, UpdateDoctorProfileRequest};
use crate::services::doctor::DoctorService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ProfileNotFound => AppError::NotFound("Doctor profile not found".to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Public doctor browsing. No authentication; approved doctors only.
#[axum::debug_handler]
pub async fn browse_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<BrowseDoctorsQuery>,
) -> Result<Json<Value>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let service = DoctorService::new(&state);
    let (doctors, total) = service.browse(&query, page, limit).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "doctors": doctors,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": (total + limit - 1) / limit
            }
        }
    })))
}

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let service = DoctorService::new(&state);
    let doctor = service.get_by_user_id(user_id, token).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "success": true, "data": doctor })))
}

#[axum::debug_handler]
pub async fn update_own_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let service = DoctorService::new(&state);
    let doctor = service.update_profile(user_id, request, token).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "success": true, "data": doctor })))
}
