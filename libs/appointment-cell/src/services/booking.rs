// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{is_conflict_error, SupabaseClient};
use doctor_cell::models::Doctor;
use patient_cell::models::Patient;
use notification_cell::models::NotificationKind;
use notification_cell::services::notify::NotificationService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
    ListAppointmentsQuery,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::video::VideoSessionService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    lifecycle: AppointmentLifecycleService,
    video: VideoSessionService,
    notifications: NotificationService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            lifecycle: AppointmentLifecycleService::new(),
            video: VideoSessionService::new(Arc::clone(&supabase)),
            notifications: NotificationService::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    pub fn video(&self) -> &VideoSessionService {
        &self.video
    }

    /// Book an appointment for the calling patient. The slot-exclusivity
    /// check runs against non-terminal statuses only; a duplicate-key
    /// rejection from the store is mapped to the same conflict.
    pub async fn book_appointment(
        &self,
        user_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment with doctor {} on {}", request.doctor_id, request.scheduled_date);

        validate_booking_request(&request)?;

        let doctor = self.get_doctor(request.doctor_id, auth_token).await?;
        if !doctor.is_approved() {
            return Err(AppointmentError::DoctorNotFound);
        }

        let patient = self.get_patient_by_user(user_id, auth_token).await?;

        // Slot conflict check over statuses that still hold the slot
        let conflict_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_date=eq.{}&slot_start=eq.{}&status=in.({})",
            doctor.id, request.scheduled_date, request.time_slot.start,
            AppointmentStatus::filter_list(&AppointmentStatus::NON_TERMINAL)
        );
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &conflict_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            warn!("Slot conflict for doctor {} on {} at {}",
                  doctor.id, request.scheduled_date, request.time_slot.start);
            return Err(AppointmentError::SlotTaken);
        }

        let now = Utc::now();
        let appointment_data = json!({
            "doctor_id": doctor.id,
            "patient_id": patient.id,
            "scheduled_date": request.scheduled_date,
            "slot_start": request.time_slot.start,
            "slot_end": request.time_slot.end,
            "status": AppointmentStatus::Pending.to_string(),
            "reason": request.reason,
            "consultation_fee": doctor.consultation_fee,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(headers),
        ).await.map_err(|e| {
            if is_conflict_error(&e) {
                AppointmentError::SlotTaken
            } else {
                AppointmentError::DatabaseError(e.to_string())
            }
        })?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create appointment".to_string()));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        self.notifications.notify(
            doctor.user_id,
            "New Appointment Request",
            &format!("A patient has booked an appointment for {}", request.scheduled_date),
            NotificationKind::Appointment,
            Some("/doctor/appointments"),
            Some(auth_token),
        ).await;

        info!("Appointment {} booked in pending status, fee {}", appointment.id, appointment.consultation_fee);
        Ok(appointment)
    }

    /// Role-scoped listing: patients and doctors see their own appointments,
    /// admins see everything.
    pub async fn list_appointments(
        &self,
        user_id: Uuid,
        role: Option<&str>,
        query: &ListAppointmentsQuery,
        auth_token: &str,
    ) -> Result<(Vec<Appointment>, i64, i64, i64), AppointmentError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let mut query_parts = Vec::new();

        match role {
            Some("patient") => {
                let patient = self.get_patient_by_user(user_id, auth_token).await?;
                query_parts.push(format!("patient_id=eq.{}", patient.id));
            }
            Some("doctor") => {
                let doctor = self.get_doctor_by_user(user_id, auth_token).await?;
                query_parts.push(format!("doctor_id=eq.{}", doctor.id));
            }
            _ => {} // admin sees all
        }

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let filters = if query_parts.is_empty() {
            String::new()
        } else {
            format!("{}&", query_parts.join("&"))
        };
        let path = format!(
            "/rest/v1/appointments?{}order=scheduled_date.desc&limit={}&offset={}",
            filters, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((appointments, total, page, limit))
    }

    /// Cancel the calling patient's appointment. One conditional update:
    /// the ownership and status preconditions are part of the filter, so a
    /// no-match result covers both "absent" and "wrong state".
    pub async fn cancel_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let patient = self.get_patient_by_user(user_id, auth_token).await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&patient_id=eq.{}&status=in.({})",
            appointment_id, patient.id,
            AppointmentStatus::filter_list(&self.lifecycle.cancellable_statuses())
        );

        let update = json!({
            "status": AppointmentStatus::Cancelled.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
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
            return Err(AppointmentError::CannotCancel);
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        info!("Appointment {} cancelled", appointment.id);
        Ok(appointment)
    }

    /// Complete a confirmed appointment (doctor action). Any active video
    /// session is force-ended and the patient is notified.
    pub async fn complete_appointment(
        &self,
        doctor_user_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Completing appointment {}", appointment_id);

        let doctor = self.get_doctor_by_user(doctor_user_id, auth_token).await?;
        let current = self.get_doctor_appointment(appointment_id, doctor.id, auth_token).await?;

        if !self.lifecycle.can_complete(&current.status) {
            return Err(AppointmentError::NotConfirmed);
        }

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&status=eq.confirmed",
            appointment_id, doctor.id
        );

        let update = json!({
            "status": AppointmentStatus::Completed.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
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
            // Lost a race against another mutation; same outcome as the
            // precondition failing up front.
            return Err(AppointmentError::NotConfirmed);
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        self.video.force_end_active(appointment.id, auth_token).await;

        let patient_user_id = self.get_patient_user_id(appointment.patient_id, auth_token).await;
        if let Some(patient_user_id) = patient_user_id {
            self.notifications.notify(
                patient_user_id,
                "Appointment Completed",
                "Your consultation has been marked as completed.",
                NotificationKind::Appointment,
                Some(&format!("/patient/appointments/{}", appointment.id)),
                Some(auth_token),
            ).await;
        }

        info!("Appointment {} completed", appointment.id);
        Ok(appointment)
    }

    /// Doctor's own appointment listing with pagination.
    pub async fn list_doctor_appointments(
        &self,
        doctor_user_id: Uuid,
        query: &ListAppointmentsQuery,
        auth_token: &str,
    ) -> Result<(Vec<Appointment>, i64, i64, i64), AppointmentError> {
        self.list_appointments(doctor_user_id, Some("doctor"), query, auth_token).await
    }

    // ==========================================================================
    // LOOKUPS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Appointment scoped to a doctor; absent and not-owned are the same
    /// NotFound.
    pub async fn get_doctor_appointment(
        &self,
        appointment_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}",
            appointment_id, doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, AppointmentError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DoctorNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn get_doctor_by_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, AppointmentError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DoctorProfileNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn get_patient_by_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, AppointmentError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::PatientProfileNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    /// Owning user of a patient profile, for notification delivery. Best
    /// effort: a lookup failure is logged, not propagated.
    async fn get_patient_user_id(&self, patient_id: Uuid, auth_token: &str) -> Option<Uuid> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=user_id", patient_id);
        let result: Result<Vec<Value>, _> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await;

        match result {
            Ok(rows) => rows.first()
                .and_then(|row| row.get("user_id"))
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok()),
            Err(e) => {
                warn!("Failed to resolve patient {} owner: {}", patient_id, e);
                None
            }
        }
    }
}

fn validate_booking_request(request: &CreateAppointmentRequest) -> Result<(), AppointmentError> {
    let time_format = Regex::new(r"^\d{2}:\d{2}$").unwrap();

    if !time_format.is_match(&request.time_slot.start) {
        return Err(AppointmentError::ValidationError("Format: HH:mm".to_string()));
    }
    if !time_format.is_match(&request.time_slot.end) {
        return Err(AppointmentError::ValidationError("Format: HH:mm".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;
    use chrono::NaiveDate;

    fn request(start: &str, end: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time_slot: TimeSlot {
                start: start.to_string(),
                end: end.to_string(),
            },
            reason: None,
        }
    }

    #[test]
    fn accepts_wall_clock_slots() {
        assert!(validate_booking_request(&request("10:00", "10:30")).is_ok());
    }

    #[test]
    fn rejects_malformed_slot_times() {
        assert!(validate_booking_request(&request("10am", "10:30")).is_err());
        assert!(validate_booking_request(&request("10:00", "1030")).is_err());
    }
}
