// libs/records-cell/src/handlers.rs
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

use crate::models::{
    CreateMedicalRecordRequest, CreatePrescriptionRequest, ListPrescriptionsQuery,
    ListRecordsQuery, RecordsError,
};
use crate::services::{MedicalRecordService, PrescriptionService};

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::NotFound => AppError::NotFound(err.to_string()),
            RecordsError::AppointmentNotEligible => AppError::NotFound(err.to_string()),
            RecordsError::DoctorProfileNotFound => AppError::NotFound(err.to_string()),
            RecordsError::PatientProfileNotFound => AppError::NotFound(err.to_string()),
            RecordsError::NotAuthorized => AppError::Forbidden(err.to_string()),
            RecordsError::ValidationError(msg) => AppError::ValidationError(msg),
            RecordsError::DatabaseError(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = PrescriptionService::new(&state);
    let prescription = service.create_prescription(user_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": prescription
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListPrescriptionsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = PrescriptionService::new(&state);
    let (prescriptions, total, page, limit) = service
        .list_prescriptions(user_id, user.role.as_deref(), &query, token)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "prescriptions": prescriptions,
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
pub async fn create_medical_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateMedicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = MedicalRecordService::new(&state);
    let record = service.create_record(user_id, user.role.as_deref(), request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": record
    })))
}

#[axum::debug_handler]
pub async fn list_medical_records(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = MedicalRecordService::new(&state);
    let (records, total, page, limit) = service
        .list_records(user_id, user.role.as_deref(), &query, token)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "records": records,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages
            }
        }
    })))
}
