use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Account row from the users table, as the admin surface sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AdminDoctorsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorApprovalRequest {
    pub doctor_id: Uuid,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminUsersQuery {
    pub role: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSuspensionRequest {
    pub user_id: Uuid,
    pub action: String,
}

/// Platform-wide analytics snapshot, computed from fetched rows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_users: usize,
    pub total_doctors: usize,
    pub active_doctors: usize,
    pub pending_doctors: usize,
    pub total_patients: usize,
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub total_revenue: f64,
    pub appointments_by_status: serde_json::Value,
    pub monthly_appointments: Vec<MonthlyCount>,
    pub recent_appointments: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MonthlyCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdminError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Admins cannot suspend themselves")]
    SelfSuspension,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
