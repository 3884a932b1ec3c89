// libs/appointment-cell/src/services/video.rs
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, VideoSession, VideoSessionStatus};

pub struct VideoSessionService {
    supabase: Arc<SupabaseClient>,
}

impl VideoSessionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Start a video session for a confirmed appointment. Reuses an open
    /// session if one exists, otherwise creates one with a fresh room id
    /// and flips it to active.
    pub async fn start_session(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<VideoSession, AppointmentError> {
        if let Some(existing) = self.get_open_session(appointment.id, auth_token).await? {
            if existing.status == VideoSessionStatus::Active {
                debug!("Session {} already active for appointment {}", existing.id, appointment.id);
                return Ok(existing);
            }
            return self.activate_session(existing.id, auth_token).await;
        }

        let now = Utc::now();
        let session_data = json!({
            "appointment_id": appointment.id,
            "room_id": generate_room_id(),
            "status": VideoSessionStatus::Active.to_string(),
            "started_at": now.to_rfc3339(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/video_sessions",
            Some(auth_token),
            Some(session_data),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create video session".to_string()));
        }

        let session: VideoSession = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse video session: {}", e)))?;

        info!("Video session {} started for appointment {}", session.id, appointment.id);
        Ok(session)
    }

    /// End the active session for an appointment, recording the elapsed
    /// duration in whole seconds.
    pub async fn end_session(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<VideoSession, AppointmentError> {
        let session = self.get_open_session(appointment_id, auth_token).await?
            .ok_or(AppointmentError::NoActiveSession)?;

        if session.status != VideoSessionStatus::Active {
            return Err(AppointmentError::NoActiveSession);
        }

        let ended_at = Utc::now();
        let duration_seconds = session.started_at
            .map(|started| (ended_at - started).num_seconds().max(0));

        let path = format!(
            "/rest/v1/video_sessions?id=eq.{}&status=eq.active",
            session.id
        );

        let update = json!({
            "status": VideoSessionStatus::Ended.to_string(),
            "ended_at": ended_at.to_rfc3339(),
            "duration_seconds": duration_seconds,
            "updated_at": ended_at.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NoActiveSession);
        }

        let session: VideoSession = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse video session: {}", e)))?;

        info!("Video session {} ended after {:?}s", session.id, session.duration_seconds);
        Ok(session)
    }

    /// End whatever session is still open when an appointment completes.
    /// Best effort: a failure here must not block completion.
    pub async fn force_end_active(&self, appointment_id: Uuid, auth_token: &str) {
        match self.end_session(appointment_id, auth_token).await {
            Ok(session) => debug!("Force-ended video session {}", session.id),
            Err(AppointmentError::NoActiveSession) => {}
            Err(e) => warn!("Failed to force-end video session for appointment {}: {}", appointment_id, e),
        }
    }

    /// Joinable session details for an appointment participant. Only an
    /// active session can be joined.
    pub async fn get_joinable_session(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<VideoSession, AppointmentError> {
        let session = self.get_open_session(appointment_id, auth_token).await?
            .ok_or(AppointmentError::NoActiveSession)?;

        if session.status != VideoSessionStatus::Active {
            return Err(AppointmentError::NoActiveSession);
        }

        Ok(session)
    }

    async fn get_open_session(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<VideoSession>, AppointmentError> {
        let path = format!(
            "/rest/v1/video_sessions?appointment_id=eq.{}&status=in.(waiting,active)&order=created_at.desc&limit=1",
            appointment_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => {
                let session = serde_json::from_value(row)
                    .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse video session: {}", e)))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn activate_session(
        &self,
        session_id: Uuid,
        auth_token: &str,
    ) -> Result<VideoSession, AppointmentError> {
        let now = Utc::now();
        let path = format!("/rest/v1/video_sessions?id=eq.{}&status=eq.waiting", session_id);

        let update = json!({
            "status": VideoSessionStatus::Active.to_string(),
            "started_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NoActiveSession);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse video session: {}", e)))
    }
}

/// Room ids are `room-` plus 12 alphanumerics, enough entropy for a
/// join link without being a credential.
fn generate_room_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("room-{}", suffix)
}
