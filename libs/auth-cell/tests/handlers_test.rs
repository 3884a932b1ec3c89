use std::sync::Arc;

use axum::extract::{Json, State};
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use auth_cell::handlers::*;
use auth_cell::models::RegisterRequest;
use shared_models::error::AppError;
use shared_utils::test_utils::TestConfig;

fn patient_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Jordan Smith".to_string(),
        email: email.to_string(),
        password: "secret123".to_string(),
        role: "patient".to_string(),
        specialization: None,
        qualifications: None,
        experience: None,
        consultation_fee: None,
        license_number: None,
    }
}

#[tokio::test]
async fn register_creates_patient_account_and_profile() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();
    let user_id = Uuid::new_v4();

    // No account with this email yet
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.jordan@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id.to_string(),
            "email": "jordan@example.com"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "role": "patient", "is_suspended": false })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "user_id": user_id.to_string() })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let result = register(
        State(Arc::new(app_config)),
        Json(patient_request("jordan@example.com")),
    ).await;

    let response = result.expect("registration should succeed").0;
    assert!(response["success"].as_bool().unwrap());
    assert_eq!(response["data"]["userId"], user_id.to_string());
    assert_eq!(response["data"]["role"], "patient");
}

#[tokio::test]
async fn register_doctor_starts_pending_approval() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": user_id.to_string() }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({ "approval_status": "pending" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = patient_request("dr.lee@example.com");
    request.role = "doctor".to_string();
    request.specialization = Some("Dermatology".to_string());
    request.qualifications = Some(vec!["MBBS".to_string()]);
    request.experience = Some(5);
    request.consultation_fee = Some(65.0);
    request.license_number = Some("MD-1142".to_string());

    let result = register(State(Arc::new(app_config)), Json(request)).await;

    let response = result.expect("registration should succeed").0;
    assert_eq!(response["data"]["role"], "doctor");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(&server)
        .await;

    let result = register(
        State(Arc::new(app_config)),
        Json(patient_request("jordan@example.com")),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::Conflict(_));
}

#[tokio::test]
async fn register_rejects_invalid_payload_before_any_call() {
    let config = TestConfig::default();
    let app_config = config.to_app_config();

    let mut request = patient_request("not-an-email");
    request.email = "not-an-email".to_string();

    let result = register(State(Arc::new(app_config)), Json(request)).await;

    assert_matches!(result.unwrap_err(), AppError::ValidationError(_));
}
