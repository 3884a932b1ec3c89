use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    // Doctor-only fields
    pub specialization: Option<String>,
    pub qualifications: Option<Vec<String>>,
    pub experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Signup failed: {0}")]
    SignupFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
