// libs/patient-cell/src/services/patient.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Patient, PatientError, UpdatePatientProfileRequest, BLOOD_GROUPS, GENDERS,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_by_user_id(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile for user {}", user_id);

        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::ProfileNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdatePatientProfileRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_profile_update(&request)?;

        let mut update_data = serde_json::Map::new();

        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(blood_group) = request.blood_group {
            update_data.insert("blood_group".to_string(), json!(blood_group));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(emergency_contact) = request.emergency_contact {
            update_data.insert("emergency_contact".to_string(), json!(emergency_contact));
        }

        if update_data.is_empty() {
            return Err(PatientError::ValidationError("No fields to update".to_string()));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::ProfileNotFound);
        }

        let patient: Patient = serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;

        info!("Patient profile {} updated", patient.id);
        Ok(patient)
    }
}

fn validate_profile_update(request: &UpdatePatientProfileRequest) -> Result<(), PatientError> {
    if let Some(gender) = &request.gender {
        if !GENDERS.contains(&gender.as_str()) {
            return Err(PatientError::ValidationError("Invalid gender".to_string()));
        }
    }

    if let Some(blood_group) = &request.blood_group {
        if !BLOOD_GROUPS.contains(&blood_group.as_str()) {
            return Err(PatientError::ValidationError("Invalid blood group".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_blood_group() {
        let request = UpdatePatientProfileRequest {
            date_of_birth: None,
            gender: None,
            blood_group: Some("C+".to_string()),
            allergies: None,
            phone: None,
            address: None,
            emergency_contact: None,
        };
        assert!(validate_profile_update(&request).is_err());
    }

    #[test]
    fn accepts_valid_profile_fields() {
        let request = UpdatePatientProfileRequest {
            date_of_birth: None,
            gender: Some("Other".to_string()),
            blood_group: Some("O-".to_string()),
            allergies: Some(vec!["penicillin".to_string()]),
            phone: None,
            address: None,
            emergency_contact: None,
        };
        assert!(validate_profile_update(&request).is_ok());
    }
}
