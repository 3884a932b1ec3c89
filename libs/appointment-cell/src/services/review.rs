// libs/appointment-cell/src/services/review.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::supabase::{is_conflict_error, SupabaseClient};

use crate::models::{AppointmentError, AppointmentStatus, Review, SubmitReviewRequest};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct ReviewService {
    supabase: Arc<SupabaseClient>,
    lifecycle: AppointmentLifecycleService,
}

impl ReviewService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Submit a review for a completed appointment. One review per
    /// appointment; the doctor's aggregate rating is recomputed afterwards.
    pub async fn submit_review(
        &self,
        patient_id: Uuid,
        request: SubmitReviewRequest,
        auth_token: &str,
    ) -> Result<Review, AppointmentError> {
        validate_review_request(&request)?;

        // The appointment must be this patient's and in a reviewable state
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&patient_id=eq.{}&status=in.({})",
            request.appointment_id, patient_id,
            AppointmentStatus::filter_list(&self.lifecycle.reviewable_statuses())
        );
        let appointments: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = appointments.into_iter().next()
            .ok_or(AppointmentError::NotFound)?;

        let doctor_id = appointment.get("doctor_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppointmentError::DatabaseError("Malformed appointment row".to_string()))?;

        let existing_path = format!(
            "/rest/v1/reviews?appointment_id=eq.{}",
            request.appointment_id
        );
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &existing_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(AppointmentError::ReviewExists);
        }

        let review_data = json!({
            "appointment_id": request.appointment_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "rating": request.rating,
            "comment": request.comment,
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/reviews",
            Some(auth_token),
            Some(review_data),
            Some(headers),
        ).await.map_err(|e| {
            if is_conflict_error(&e) {
                AppointmentError::ReviewExists
            } else {
                AppointmentError::DatabaseError(e.to_string())
            }
        })?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create review".to_string()));
        }

        let review: Review = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse review: {}", e)))?;

        self.recompute_doctor_rating(doctor_id, auth_token).await;

        info!("Review {} submitted for doctor {} (rating {})", review.id, doctor_id, review.rating);
        Ok(review)
    }

    /// Public review listing for a doctor, newest first. Served with the
    /// anon key, no caller token required.
    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Review>, i64), AppointmentError> {
        let offset = (page - 1) * limit;
        let path = format!(
            "/rest/v1/reviews?doctor_id=eq.{}&order=created_at.desc&limit={}&offset={}",
            doctor_id, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let reviews: Vec<Review> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((reviews, total))
    }

    /// Recompute and store the doctor's mean rating, rounded to one
    /// decimal place. Best effort: the review itself already landed.
    async fn recompute_doctor_rating(&self, doctor_id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/reviews?doctor_id=eq.{}&select=rating", doctor_id);
        let rows: Result<Vec<Value>, _> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await;

        let ratings: Vec<i64> = match rows {
            Ok(rows) => rows.iter()
                .filter_map(|r| r.get("rating").and_then(|v| v.as_i64()))
                .collect(),
            Err(e) => {
                warn!("Failed to load ratings for doctor {}: {}", doctor_id, e);
                return;
            }
        };

        if ratings.is_empty() {
            return;
        }

        let average = round_rating(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64);

        let update_path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let update = json!({
            "rating_average": average,
            "rating_count": ratings.len(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Result<Vec<Value>, _> = self.supabase.request(
            Method::PATCH,
            &update_path,
            Some(auth_token),
            Some(update),
        ).await;

        if let Err(e) = result {
            warn!("Failed to update rating for doctor {}: {}", doctor_id, e);
        }
    }
}

const MAX_COMMENT_LENGTH: usize = 500;

fn validate_review_request(request: &SubmitReviewRequest) -> Result<(), AppointmentError> {
    if !(1..=5).contains(&request.rating) {
        return Err(AppointmentError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    if let Some(comment) = &request.comment {
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppointmentError::ValidationError(format!(
                "Comment must be at most {} characters", MAX_COMMENT_LENGTH
            )));
        }
    }

    Ok(())
}

fn round_rating(mean: f64) -> f64 {
    (mean * 10.0).round() / 10.0
}
