use std::sync::Arc;

use axum::{
    extract::{Extension, State},
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

use crate::models::{MarkReadRequest, NotificationError};
use crate::services::notify::NotificationService;

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = NotificationService::new(Arc::new(SupabaseClient::new(&state)));

    let (notifications, unread_count) = service.list_for_user(user_id, token).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "notifications": notifications,
            "unreadCount": unread_count
        }
    })))
}

#[axum::debug_handler]
pub async fn mark_notifications_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let service = NotificationService::new(Arc::new(SupabaseClient::new(&state)));

    if request.action.as_deref() == Some("read-all") {
        service.mark_all_read(user_id, token).await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        return Ok(Json(json!({
            "success": true,
            "data": { "message": "All notifications marked as read" }
        })));
    }

    let notification_id = request.notification_id
        .ok_or_else(|| AppError::BadRequest("notificationId required".to_string()))?;

    service.mark_read(notification_id, user_id, token).await
        .map_err(|e| match e {
            NotificationError::NotFound => AppError::NotFound("Notification not found".to_string()),
            _ => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "data": { "message": "Notification marked as read" }
    })))
}
