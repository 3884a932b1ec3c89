// libs/doctor-cell/src/services/doctor.rs
use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BrowseDoctorsQuery, Doctor, DoctorError, UpdateDoctorProfileRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Fetch a doctor profile by its owning user account.
    pub async fn get_by_user_id(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile for user {}", user_id);

        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::ProfileNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn get_by_id(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    /// Public doctor browsing: approved doctors only, optional specialization
    /// and minimum-rating filters, sorted and paginated.
    pub async fn browse(
        &self,
        query: &BrowseDoctorsQuery,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Doctor>, i64), DoctorError> {
        let mut query_parts = vec!["approval_status=eq.approved".to_string()];

        if let Some(specialization) = &query.specialization {
            query_parts.push(format!(
                "specialization=ilike.*{}*",
                urlencoding::encode(specialization)
            ));
        }
        if let Some(min_rating) = query.min_rating {
            query_parts.push(format!("rating_average=gte.{}", min_rating));
        }

        let order = match query.sort.as_deref() {
            Some("fee-low") => "consultation_fee.asc",
            Some("fee-high") => "consultation_fee.desc",
            Some("experience") => "experience_years.desc",
            _ => "rating_average.desc",
        };

        let offset = (page - 1) * limit;
        let path = format!(
            "/rest/v1/doctors?{}&order={}&limit={}&offset={}",
            query_parts.join("&"), order, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctors: Vec<Doctor> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((doctors, total))
    }

    /// Apply a discriminated self-service update to the caller's profile.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        validate_profile_update(&request)?;

        let mut update_data = serde_json::Map::new();

        match request.update_type.as_deref() {
            Some("fee") => {
                let fee = request.consultation_fee
                    .ok_or_else(|| DoctorError::ValidationError("consultationFee required".to_string()))?;
                update_data.insert("consultation_fee".to_string(), json!(fee));
            }
            Some("availability") => {
                let availability = request.availability
                    .ok_or_else(|| DoctorError::ValidationError("availability required".to_string()))?;
                update_data.insert("availability".to_string(), json!(availability));
            }
            _ => {
                if let Some(specialization) = request.specialization {
                    update_data.insert("specialization".to_string(), json!(specialization));
                }
                if let Some(qualifications) = request.qualifications {
                    update_data.insert("qualifications".to_string(), json!(qualifications));
                }
                if let Some(experience) = request.experience {
                    update_data.insert("experience_years".to_string(), json!(experience));
                }
                if let Some(bio) = request.bio {
                    update_data.insert("bio".to_string(), json!(bio));
                }
            }
        }

        if update_data.is_empty() {
            return Err(DoctorError::ValidationError("No fields to update".to_string()));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::ProfileNotFound);
        }

        let doctor: Doctor = serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;

        info!("Doctor profile {} updated", doctor.id);
        Ok(doctor)
    }
}

fn validate_profile_update(request: &UpdateDoctorProfileRequest) -> Result<(), DoctorError> {
    if let Some(fee) = request.consultation_fee {
        if fee < 0.0 {
            return Err(DoctorError::ValidationError("Fee must be positive".to_string()));
        }
    }

    if let Some(availability) = &request.availability {
        let time_format = Regex::new(r"^\d{2}:\d{2}$").unwrap();
        for slot in availability {
            if !time_format.is_match(&slot.start_time) || !time_format.is_match(&slot.end_time) {
                return Err(DoctorError::ValidationError("Format: HH:mm".to_string()));
            }
        }
    }

    if let Some(specialization) = &request.specialization {
        if specialization.len() < 2 {
            return Err(DoctorError::ValidationError(
                "Specialization must be at least 2 characters".to_string(),
            ));
        }
    }

    if let Some(experience) = request.experience {
        if experience < 0 {
            return Err(DoctorError::ValidationError("Experience must be positive".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilitySlot, Weekday};

    fn base_request() -> UpdateDoctorProfileRequest {
        UpdateDoctorProfileRequest {
            update_type: None,
            consultation_fee: None,
            availability: None,
            specialization: None,
            qualifications: None,
            experience: None,
            bio: None,
        }
    }

    #[test]
    fn rejects_negative_fee() {
        let request = UpdateDoctorProfileRequest {
            update_type: Some("fee".to_string()),
            consultation_fee: Some(-5.0),
            ..base_request()
        };
        assert!(validate_profile_update(&request).is_err());
    }

    #[test]
    fn rejects_malformed_availability_times() {
        let request = UpdateDoctorProfileRequest {
            update_type: Some("availability".to_string()),
            availability: Some(vec![AvailabilitySlot {
                day: Weekday::Mon,
                start_time: "9am".to_string(),
                end_time: "17:00".to_string(),
                is_active: true,
            }]),
            ..base_request()
        };
        assert!(validate_profile_update(&request).is_err());
    }

    #[test]
    fn accepts_valid_availability() {
        let request = UpdateDoctorProfileRequest {
            update_type: Some("availability".to_string()),
            availability: Some(vec![AvailabilitySlot {
                day: Weekday::Tue,
                start_time: "09:00".to_string(),
                end_time: "17:00".to_string(),
                is_active: true,
            }]),
            ..base_request()
        };
        assert!(validate_profile_update(&request).is_ok());
    }
}
