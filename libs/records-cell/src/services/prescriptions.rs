// libs/records-cell/src/services/prescriptions.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use notification_cell::models::NotificationKind;
use notification_cell::services::notify::NotificationService;

use crate::models::{CreatePrescriptionRequest, ListPrescriptionsQuery, Prescription, RecordsError};

pub struct PrescriptionService {
    supabase: Arc<SupabaseClient>,
    notifications: NotificationService,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            notifications: NotificationService::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Issue a prescription against the doctor's own confirmed or completed
    /// appointment. The patient is notified on success.
    pub async fn create_prescription(
        &self,
        doctor_user_id: Uuid,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        validate_prescription(&request)?;

        let doctor_id = self.profile_id("doctors", doctor_user_id, auth_token)
            .await?
            .ok_or(RecordsError::DoctorProfileNotFound)?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&status=in.(confirmed,completed)",
            request.appointment_id, doctor_id
        );
        let appointments: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let appointment = appointments.into_iter().next()
            .ok_or(RecordsError::AppointmentNotEligible)?;

        let patient_id = appointment.get("patient_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RecordsError::DatabaseError("Malformed appointment row".to_string()))?;

        let now = Utc::now();
        let prescription_data = json!({
            "appointment_id": request.appointment_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "diagnosis": request.diagnosis,
            "medications": request.medications,
            "instructions": request.instructions,
            "follow_up_date": request.follow_up_date,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/prescriptions",
            Some(auth_token),
            Some(prescription_data),
            Some(headers),
        ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(RecordsError::DatabaseError("Failed to create prescription".to_string()));
        }

        let prescription: Prescription = serde_json::from_value(result[0].clone())
            .map_err(|e| RecordsError::DatabaseError(format!("Failed to parse prescription: {}", e)))?;

        if let Some(patient_user_id) = self.profile_owner("patients", patient_id, auth_token).await {
            self.notifications.notify(
                patient_user_id,
                "New Prescription",
                "Your doctor has issued a new prescription.",
                NotificationKind::Prescription,
                Some("/patient/prescriptions"),
                Some(auth_token),
            ).await;
        }

        info!("Prescription {} issued for appointment {}", prescription.id, request.appointment_id);
        Ok(prescription)
    }

    /// Role-scoped prescription listing with an optional appointment filter.
    pub async fn list_prescriptions(
        &self,
        user_id: Uuid,
        role: Option<&str>,
        query: &ListPrescriptionsQuery,
        auth_token: &str,
    ) -> Result<(Vec<Prescription>, i64, i64, i64), RecordsError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let mut query_parts = Vec::new();

        match role {
            Some("patient") => {
                let patient_id = self.profile_id("patients", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::PatientProfileNotFound)?;
                query_parts.push(format!("patient_id=eq.{}", patient_id));
            }
            Some("doctor") => {
                let doctor_id = self.profile_id("doctors", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::DoctorProfileNotFound)?;
                query_parts.push(format!("doctor_id=eq.{}", doctor_id));
            }
            _ => {}
        }

        if let Some(appointment_id) = query.appointment_id {
            query_parts.push(format!("appointment_id=eq.{}", appointment_id));
        }

        let filters = if query_parts.is_empty() {
            String::new()
        } else {
            format!("{}&", query_parts.join("&"))
        };
        let path = format!(
            "/rest/v1/prescriptions?{}order=created_at.desc&limit={}&offset={}",
            filters, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let prescriptions: Vec<Prescription> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((prescriptions, total, page, limit))
    }

    async fn profile_id(
        &self,
        table: &str,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Uuid>, RecordsError> {
        let path = format!("/rest/v1/{}?user_id=eq.{}&select=id", table, user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        Ok(result.first()
            .and_then(|row| row.get("id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok()))
    }

    async fn profile_owner(&self, table: &str, profile_id: Uuid, auth_token: &str) -> Option<Uuid> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=user_id", table, profile_id);
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
                warn!("Failed to resolve {} profile {} owner: {}", table, profile_id, e);
                None
            }
        }
    }
}

fn validate_prescription(request: &CreatePrescriptionRequest) -> Result<(), RecordsError> {
    if request.diagnosis.trim().len() < 3 {
        return Err(RecordsError::ValidationError(
            "Diagnosis must be at least 3 characters".to_string(),
        ));
    }
    if request.medications.is_empty() {
        return Err(RecordsError::ValidationError(
            "At least one medication is required".to_string(),
        ));
    }
    for medication in &request.medications {
        if medication.name.trim().is_empty()
            || medication.dosage.trim().is_empty()
            || medication.frequency.trim().is_empty()
            || medication.duration.trim().is_empty()
        {
            return Err(RecordsError::ValidationError(
                "Each medication needs name, dosage, frequency and duration".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medication;

    fn medication(name: &str) -> Medication {
        Medication {
            name: name.to_string(),
            dosage: "500mg".to_string(),
            frequency: "twice daily".to_string(),
            duration: "5 days".to_string(),
            notes: None,
        }
    }

    fn request(diagnosis: &str, medications: Vec<Medication>) -> CreatePrescriptionRequest {
        CreatePrescriptionRequest {
            appointment_id: Uuid::new_v4(),
            diagnosis: diagnosis.to_string(),
            medications,
            instructions: None,
            follow_up_date: None,
        }
    }

    #[test]
    fn accepts_complete_prescription() {
        assert!(validate_prescription(&request("Sinusitis", vec![medication("Amoxicillin")])).is_ok());
    }

    #[test]
    fn rejects_empty_medication_list() {
        assert!(validate_prescription(&request("Sinusitis", vec![])).is_err());
    }

    #[test]
    fn rejects_short_diagnosis() {
        assert!(validate_prescription(&request("ok", vec![medication("Amoxicillin")])).is_err());
    }

    #[test]
    fn rejects_medication_with_blank_dosage() {
        let mut bad = medication("Amoxicillin");
        bad.dosage = "  ".to_string();
        assert!(validate_prescription(&request("Sinusitis", vec![bad])).is_err());
    }
}
