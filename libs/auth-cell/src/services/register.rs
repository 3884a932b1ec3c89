// libs/auth-cell/src/services/register.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AuthError, RegisterRequest};

pub struct RegistrationService {
    supabase: Arc<SupabaseClient>,
}

impl RegistrationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Register a patient or doctor. Creates the auth account, the users
    /// row and the role profile. Doctors start in the pending approval
    /// queue and stay invisible to browsing until approved.
    pub async fn register(&self, request: RegisterRequest) -> Result<Value, AuthError> {
        validate_registration(&request)?;

        let email = request.email.trim().to_lowercase();

        let existing_path = format!("/rest/v1/users?email=eq.{}&select=id", email);
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &existing_path,
            None,
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(AuthError::EmailTaken);
        }

        let signup_body = json!({
            "email": email,
            "password": request.password,
        });
        let signup: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(signup_body),
        ).await.map_err(|e| AuthError::SignupFailed(e.to_string()))?;

        let user_id = signup.get("id")
            .or_else(|| signup.get("user").and_then(|u| u.get("id")))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AuthError::SignupFailed("No user id in signup response".to_string()))?;

        let now = Utc::now();
        let user_row = json!({
            "id": user_id,
            "name": request.name.trim(),
            "email": email,
            "role": request.role,
            "is_suspended": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });
        let _: Vec<Value> = self.supabase.request(
            Method::POST,
            "/rest/v1/users",
            None,
            Some(user_row),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        match request.role.as_str() {
            "doctor" => {
                let doctor_row = json!({
                    "user_id": user_id,
                    "specialization": request.specialization,
                    "qualifications": request.qualifications,
                    "experience_years": request.experience,
                    "bio": Value::Null,
                    "consultation_fee": request.consultation_fee,
                    "availability": [],
                    "approval_status": "pending",
                    "rating_average": 0.0,
                    "rating_count": 0,
                    "license_number": request.license_number,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339(),
                });
                let _: Vec<Value> = self.supabase.request(
                    Method::POST,
                    "/rest/v1/doctors",
                    None,
                    Some(doctor_row),
                ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;
            }
            _ => {
                let patient_row = json!({
                    "user_id": user_id,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339(),
                });
                let _: Vec<Value> = self.supabase.request(
                    Method::POST,
                    "/rest/v1/patients",
                    None,
                    Some(patient_row),
                ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;
            }
        }

        info!("Registered {} account for {}", request.role, email);
        Ok(json!({
            "userId": user_id,
            "role": request.role,
        }))
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    if request.name.trim().len() < 2 {
        return Err(AuthError::ValidationError(
            "Name must be at least 2 characters".to_string(),
        ));
    }
    let email = request.email.trim();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AuthError::ValidationError("Invalid email address".to_string()));
    }
    if request.password.len() < 6 {
        return Err(AuthError::ValidationError(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    match request.role.as_str() {
        "patient" => Ok(()),
        "doctor" => {
            if request.specialization.as_deref().map_or(true, |s| s.trim().len() < 2) {
                return Err(AuthError::ValidationError(
                    "Specialization must be at least 2 characters".to_string(),
                ));
            }
            if request.qualifications.as_ref().map_or(true, |q| q.is_empty()) {
                return Err(AuthError::ValidationError(
                    "At least one qualification is required".to_string(),
                ));
            }
            if request.experience.map_or(true, |e| e < 0) {
                return Err(AuthError::ValidationError(
                    "Experience must be zero or more years".to_string(),
                ));
            }
            if request.consultation_fee.map_or(true, |f| f < 0.0) {
                return Err(AuthError::ValidationError(
                    "Consultation fee must be zero or more".to_string(),
                ));
            }
            if request.license_number.as_deref().map_or(true, |l| l.trim().len() < 3) {
                return Err(AuthError::ValidationError(
                    "License number must be at least 3 characters".to_string(),
                ));
            }
            Ok(())
        }
        other => Err(AuthError::ValidationError(format!("Unknown role: {}", other))),
    }
}
