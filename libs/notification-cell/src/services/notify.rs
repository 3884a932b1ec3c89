use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Notification, NotificationError, NotificationKind};

pub struct NotificationService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fire-and-forget notification creation. Delivery is best-effort: a
    /// failed insert is logged and swallowed so the triggering operation
    /// never fails because of it.
    pub async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        kind: NotificationKind,
        link: Option<&str>,
        auth_token: Option<&str>,
    ) {
        let body = json!({
            "user_id": user_id,
            "title": title,
            "message": message,
            "type": kind.to_string(),
            "link": link,
            "is_read": false,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Result<Vec<Value>, _> = self.supabase.request(
            Method::POST,
            "/rest/v1/notifications",
            auth_token,
            Some(body),
        ).await;

        match result {
            Ok(_) => debug!("Notification queued for user {}", user_id),
            Err(e) => warn!("Failed to queue notification for user {}: {}", user_id, e),
        }
    }

    /// Latest notifications for a user plus the unread count.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<(Vec<Notification>, usize), NotificationError> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit=50",
            user_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let notifications: Vec<Notification> = result
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        let unread_count = notifications.iter().filter(|n| !n.is_read).count();

        Ok((notifications, unread_count))
    }

    /// Mark a single notification as read, scoped to its owner.
    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let path = format!(
            "/rest/v1/notifications?id=eq.{}&user_id=eq.{}",
            notification_id, user_id
        );

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(headers),
        ).await.map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(NotificationError::NotFound);
        }

        Ok(())
    }

    /// Mark everything unread for a user as read.
    pub async fn mark_all_read(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&is_read=eq.false",
            user_id
        );

        let _: Vec<Value> = self.supabase.request(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
        ).await.map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
