// libs/admin-cell/src/handlers.rs
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
    AdminDoctorsQuery, AdminError, AdminUsersQuery, DoctorApprovalRequest, UserSuspensionRequest,
};
use crate::services::AdminService;

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AdminError::UserNotFound => AppError::NotFound(err.to_string()),
            AdminError::SelfSuspension => AppError::BadRequest(err.to_string()),
            AdminError::ValidationError(msg) => AppError::ValidationError(msg),
            AdminError::DatabaseError(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AdminDoctorsQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;
    let token = auth.token();

    let service = AdminService::new(&state);
    let (doctors, total, page, limit) = service.list_doctors(&query, token).await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "doctors": doctors,
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
pub async fn review_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DoctorApprovalRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;
    let token = auth.token();

    let service = AdminService::new(&state);
    let doctor = service.set_doctor_approval(request.doctor_id, &request.action, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor
    })))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;
    let token = auth.token();

    let service = AdminService::new(&state);
    let (users, total, page, limit) = service.list_users(&query, token).await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "users": users,
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
pub async fn moderate_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UserSuspensionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;
    let token = auth.token();
    let admin_user_id = parse_user_id(&user)?;

    let service = AdminService::new(&state);
    let account = service
        .set_user_suspension(admin_user_id, request.user_id, &request.action, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": account
    })))
}

#[axum::debug_handler]
pub async fn get_analytics(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;
    let token = auth.token();

    let service = AdminService::new(&state);
    let summary = service.analytics(token).await?;

    Ok(Json(json!({
        "success": true,
        "data": summary
    })))
}
