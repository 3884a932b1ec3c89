// libs/admin-cell/src/services/admin.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use doctor_cell::models::Doctor;
use notification_cell::models::NotificationKind;
use notification_cell::services::notify::NotificationService;

use crate::models::{
    AdminDoctorsQuery, AdminError, AdminUsersQuery, AnalyticsSummary, MonthlyCount, UserAccount,
};

pub struct AdminService {
    supabase: Arc<SupabaseClient>,
    notifications: NotificationService,
}

impl AdminService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            notifications: NotificationService::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Doctors by approval status. Defaults to the pending queue; `ALL`
    /// lifts the filter.
    pub async fn list_doctors(
        &self,
        query: &AdminDoctorsQuery,
        auth_token: &str,
    ) -> Result<(Vec<Doctor>, i64, i64, i64), AdminError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let status = query.status.as_deref().unwrap_or("pending");
        let filter = if status.eq_ignore_ascii_case("all") {
            String::new()
        } else {
            match status {
                "pending" | "approved" | "rejected" => format!("approval_status=eq.{}&", status),
                other => {
                    return Err(AdminError::ValidationError(format!(
                        "Unknown approval status: {}", other
                    )));
                }
            }
        };

        let path = format!(
            "/rest/v1/doctors?{}order=created_at.desc&limit={}&offset={}",
            filter, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| AdminError::DatabaseError(e.to_string()))?;

        let doctors: Vec<Doctor> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((doctors, total, page, limit))
    }

    /// Approve or reject a doctor and tell them about it.
    pub async fn set_doctor_approval(
        &self,
        doctor_id: Uuid,
        action: &str,
        auth_token: &str,
    ) -> Result<Doctor, AdminError> {
        let new_status = match action {
            "approve" => "approved",
            "reject" => "rejected",
            other => {
                return Err(AdminError::ValidationError(format!("Unknown action: {}", other)));
            }
        };

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let update = json!({
            "approval_status": new_status,
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
        ).await.map_err(|e| AdminError::DatabaseError(e.to_string()))?;

        let doctor: Doctor = result.into_iter().next()
            .ok_or(AdminError::DoctorNotFound)
            .and_then(|row| serde_json::from_value(row)
                .map_err(|e| AdminError::DatabaseError(format!("Failed to parse doctor: {}", e))))?;

        let message = if new_status == "approved" {
            "Your profile has been approved. Patients can now book appointments with you."
        } else {
            "Your profile application was not approved."
        };
        self.notifications.notify(
            doctor.user_id,
            "Profile Review",
            message,
            NotificationKind::System,
            Some("/doctor/me"),
            Some(auth_token),
        ).await;

        info!("Doctor {} {}", doctor.id, new_status);
        Ok(doctor)
    }

    /// Account listing with an optional role filter.
    pub async fn list_users(
        &self,
        query: &AdminUsersQuery,
        auth_token: &str,
    ) -> Result<(Vec<UserAccount>, i64, i64, i64), AdminError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let filter = match query.role.as_deref() {
            Some(role @ ("admin" | "doctor" | "patient")) => format!("role=eq.{}&", role),
            Some(other) => {
                return Err(AdminError::ValidationError(format!("Unknown role: {}", other)));
            }
            None => String::new(),
        };

        let path = format!(
            "/rest/v1/users?{}order=created_at.desc&limit={}&offset={}",
            filter, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| AdminError::DatabaseError(e.to_string()))?;

        let users: Vec<UserAccount> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((users, total, page, limit))
    }

    /// Suspend or reinstate an account. Suspension takes effect at the
    /// auth middleware on the user's next request.
    pub async fn set_user_suspension(
        &self,
        admin_user_id: Uuid,
        target_user_id: Uuid,
        action: &str,
        auth_token: &str,
    ) -> Result<UserAccount, AdminError> {
        let suspend = match action {
            "suspend" => true,
            "unsuspend" => false,
            other => {
                return Err(AdminError::ValidationError(format!("Unknown action: {}", other)));
            }
        };

        if suspend && admin_user_id == target_user_id {
            return Err(AdminError::SelfSuspension);
        }

        let path = format!("/rest/v1/users?id=eq.{}", target_user_id);
        let update = json!({
            "is_suspended": suspend,
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
        ).await.map_err(|e| AdminError::DatabaseError(e.to_string()))?;

        let account: UserAccount = result.into_iter().next()
            .ok_or(AdminError::UserNotFound)
            .and_then(|row| serde_json::from_value(row)
                .map_err(|e| AdminError::DatabaseError(format!("Failed to parse user: {}", e))))?;

        info!("User {} {}", account.id, if suspend { "suspended" } else { "reinstated" });
        Ok(account)
    }

    /// Platform analytics. Rows are fetched and aggregated here rather
    /// than pushed down to the store.
    pub async fn analytics(&self, auth_token: &str) -> Result<AnalyticsSummary, AdminError> {
        let users: Vec<Value> = self.fetch("/rest/v1/users?select=role", auth_token).await?;
        let doctors: Vec<Value> = self.fetch("/rest/v1/doctors?select=approval_status", auth_token).await?;
        let appointments: Vec<Value> = self.fetch(
            "/rest/v1/appointments?select=status,created_at",
            auth_token,
        ).await?;
        let payments: Vec<Value> = self.fetch(
            "/rest/v1/payments?select=status,amount",
            auth_token,
        ).await?;
        let recent: Vec<Value> = self.fetch(
            "/rest/v1/appointments?order=created_at.desc&limit=5",
            auth_token,
        ).await?;

        let total_patients = users.iter()
            .filter(|u| u.get("role").and_then(|v| v.as_str()) == Some("patient"))
            .count();
        let active_doctors = doctors.iter()
            .filter(|d| d.get("approval_status").and_then(|v| v.as_str()) == Some("approved"))
            .count();
        let pending_doctors = doctors.iter()
            .filter(|d| d.get("approval_status").and_then(|v| v.as_str()) == Some("pending"))
            .count();

        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_month: BTreeMap<String, usize> = BTreeMap::new();
        let mut completed = 0usize;
        for appointment in &appointments {
            if let Some(status) = appointment.get("status").and_then(|v| v.as_str()) {
                *by_status.entry(status.to_string()).or_default() += 1;
                if status == "completed" {
                    completed += 1;
                }
            }
            if let Some(created) = appointment.get("created_at").and_then(|v| v.as_str()) {
                if created.len() >= 7 {
                    *by_month.entry(created[..7].to_string()).or_default() += 1;
                }
            }
        }

        let total_revenue = payments.iter()
            .filter(|p| p.get("status").and_then(|v| v.as_str()) == Some("success"))
            .filter_map(|p| p.get("amount").and_then(|v| v.as_f64()))
            .sum();

        let monthly_appointments = by_month.into_iter()
            .map(|(month, count)| MonthlyCount { month, count })
            .collect();

        Ok(AnalyticsSummary {
            total_users: users.len(),
            total_doctors: doctors.len(),
            active_doctors,
            pending_doctors,
            total_patients,
            total_appointments: appointments.len(),
            completed_appointments: completed,
            total_revenue,
            appointments_by_status: json!(by_status),
            monthly_appointments,
            recent_appointments: recent,
        })
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<Value>, AdminError> {
        self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| {
            warn!("Analytics fetch failed for {}: {}", path, e);
            AdminError::DatabaseError(e.to_string())
        })
    }
}
