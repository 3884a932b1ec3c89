// libs/payment-cell/src/handlers.rs
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

use crate::models::{ConfirmPaymentRequest, InitiatePaymentRequest, ListPaymentsQuery, PaymentError};
use crate::services::PaymentService;

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound => AppError::NotFound(err.to_string()),
            PaymentError::AppointmentNotPayable => AppError::NotFound(err.to_string()),
            PaymentError::AlreadyPaid => AppError::Conflict(err.to_string()),
            PaymentError::PatientProfileNotFound => AppError::NotFound(err.to_string()),
            PaymentError::DatabaseError(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn initiate_payment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = PaymentService::new(&state);
    let payment = service.initiate_payment(user_id, request.appointment_id, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}

/// Gateway settlement callback. No auth middleware on this route; the
/// transaction id is the only credential the gateway has.
#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PaymentService::new(&state);
    let payment = service.confirm_payment(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}

#[axum::debug_handler]
pub async fn list_payments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = PaymentService::new(&state);
    let (payments, total, page, limit) = service
        .list_payments(user_id, user.role.as_deref(), &query, token)
        .await?;
    let pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "payments": payments,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages
            }
        }
    })))
}
