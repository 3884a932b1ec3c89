// libs/records-cell/src/services/records.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateMedicalRecordRequest, ListRecordsQuery, MedicalRecord, RecordsError};

pub struct MedicalRecordService {
    supabase: Arc<SupabaseClient>,
}

impl MedicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Add a medical record. Patients upload for themselves; doctors may
    /// upload for a patient only through an appointment that links them.
    pub async fn create_record(
        &self,
        user_id: Uuid,
        role: Option<&str>,
        request: CreateMedicalRecordRequest,
        auth_token: &str,
    ) -> Result<MedicalRecord, RecordsError> {
        if request.title.trim().is_empty() {
            return Err(RecordsError::ValidationError("Title is required".to_string()));
        }
        if request.file_url.trim().is_empty() {
            return Err(RecordsError::ValidationError("File URL is required".to_string()));
        }

        let (patient_id, appointment_id) = match role {
            Some("patient") => {
                let patient_id = self.profile_id("patients", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::PatientProfileNotFound)?;
                (patient_id, request.appointment_id)
            }
            Some("doctor") => {
                let doctor_id = self.profile_id("doctors", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::DoctorProfileNotFound)?;
                let appointment_id = request.appointment_id
                    .ok_or(RecordsError::NotAuthorized)?;

                // The appointment is the authorization link to the patient
                let path = format!(
                    "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}",
                    appointment_id, doctor_id
                );
                let appointments: Vec<Value> = self.supabase.request(
                    Method::GET,
                    &path,
                    Some(auth_token),
                    None,
                ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

                let appointment = appointments.into_iter().next()
                    .ok_or(RecordsError::NotAuthorized)?;
                let patient_id = appointment.get("patient_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| RecordsError::DatabaseError("Malformed appointment row".to_string()))?;
                (patient_id, Some(appointment_id))
            }
            _ => return Err(RecordsError::NotAuthorized),
        };

        let record_data = json!({
            "patient_id": patient_id,
            "uploaded_by": user_id,
            "title": request.title,
            "description": request.description,
            "file_url": request.file_url,
            "file_type": request.file_type,
            "appointment_id": appointment_id,
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/medical_records",
            Some(auth_token),
            Some(record_data),
            Some(headers),
        ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(RecordsError::DatabaseError("Failed to create medical record".to_string()));
        }

        let record: MedicalRecord = serde_json::from_value(result[0].clone())
            .map_err(|e| RecordsError::DatabaseError(format!("Failed to parse medical record: {}", e)))?;

        info!("Medical record {} added for patient {}", record.id, patient_id);
        Ok(record)
    }

    /// Patients list their own records; doctors list records of patients
    /// they have appointments with.
    pub async fn list_records(
        &self,
        user_id: Uuid,
        role: Option<&str>,
        query: &ListRecordsQuery,
        auth_token: &str,
    ) -> Result<(Vec<MedicalRecord>, i64, i64, i64), RecordsError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let scope = match role {
            Some("patient") => {
                let patient_id = self.profile_id("patients", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::PatientProfileNotFound)?;
                format!("patient_id=eq.{}&", patient_id)
            }
            Some("doctor") => {
                let doctor_id = self.profile_id("doctors", user_id, auth_token)
                    .await?
                    .ok_or(RecordsError::DoctorProfileNotFound)?;
                let treated = self.treated_patient_ids(doctor_id, auth_token).await?;
                if treated.is_empty() {
                    return Ok((Vec::new(), 0, page, limit));
                }
                let ids: Vec<String> = treated.iter().map(|id| id.to_string()).collect();
                format!("patient_id=in.({})&", ids.join(","))
            }
            _ => return Err(RecordsError::NotAuthorized),
        };

        let path = format!(
            "/rest/v1/medical_records?{}order=created_at.desc&limit={}&offset={}",
            scope, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let records: Vec<MedicalRecord> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((records, total, page, limit))
    }

    async fn treated_patient_ids(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, RecordsError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&select=patient_id",
            doctor_id
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let mut ids: Vec<Uuid> = rows.iter()
            .filter_map(|row| row.get("patient_id"))
            .filter_map(|v| v.as_str())
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
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
}
