use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockRows, TestConfig, TestUser};

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

fn auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn booking_request(doctor_id: Uuid) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        doctor_id,
        scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        time_slot: TimeSlot {
            start: "10:00".to_string(),
            end: "10:30".to_string(),
        },
        reason: Some("Regular checkup".to_string()),
    }
}

async fn mount_patient_lookup(server: &MockServer, patient_id: &str, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::patient(patient_id, user_id)
        ])))
        .mount(server)
        .await;
}

async fn mount_doctor_lookup(server: &MockServer, doctor_id: &str, approval: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::doctor(doctor_id, &Uuid::new_v4().to_string(), 50.0, approval)
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn book_appointment_creates_pending_with_fee_snapshot() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4();

    mount_doctor_lookup(&server, &doctor_id.to_string(), "approved").await;
    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    // No conflicting holds on the slot
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "pending", "consultation_fee": 50.0 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::appointment(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &patient_id,
                "pending",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = book_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(booking_request(doctor_id)),
    ).await;

    let response = result.expect("booking should succeed").0;
    assert!(response["success"].as_bool().unwrap());
    assert_eq!(response["data"]["status"], "pending");
    assert_eq!(response["data"]["consultation_fee"], 50.0);
}

#[tokio::test]
async fn book_appointment_rejects_taken_slot() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4();

    mount_doctor_lookup(&server, &doctor_id.to_string(), "approved").await;
    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    // Another patient already holds the slot in a non-terminal status
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                "confirmed",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    let result = book_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(booking_request(doctor_id)),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::Conflict(_));
}

#[tokio::test]
async fn book_appointment_rejects_unapproved_doctor() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    mount_doctor_lookup(&server, &doctor_id.to_string(), "pending").await;

    let result = book_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(booking_request(doctor_id)),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::NotFound(_));
}

#[tokio::test]
async fn book_appointment_requires_patient_role() {
    let config = TestConfig::default();
    let app_config = config.to_app_config();

    let doctor_user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor_user, &app_config.supabase_jwt_secret, Some(24));

    let result = book_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&doctor_user),
        Json(booking_request(Uuid::new_v4())),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::Forbidden(_));
}

#[tokio::test]
async fn cancel_appointment_in_terminal_state_is_not_found() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4();

    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    // The status filter excludes completed rows, so the update matches nothing
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(CancelAppointmentRequest { appointment_id }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::NotFound(_));
}

#[tokio::test]
async fn cancel_appointment_releases_pending_hold() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4();

    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "in.(pending,paid)"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &patient_id,
                "cancelled",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(CancelAppointmentRequest { appointment_id }),
    ).await;

    let response = result.expect("cancel should succeed").0;
    assert_eq!(response["data"]["status"], "cancelled");
}

#[tokio::test]
async fn complete_requires_confirmed_status() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let doctor_user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor_user, &app_config.supabase_jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", doctor_user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::doctor(&doctor_id, &doctor_user.id, 50.0, "approved")
        ])))
        .mount(&server)
        .await;

    // Appointment still awaiting payment
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment_id.to_string(),
                &doctor_id,
                &Uuid::new_v4().to_string(),
                "pending",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    let result = doctor_appointment_action(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&doctor_user),
        Json(DoctorActionRequest {
            appointment_id,
            action: "complete".to_string(),
        }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::BadRequest(_));
}

#[tokio::test]
async fn complete_marks_confirmed_appointment_done() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let doctor_user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor_user, &app_config.supabase_jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", doctor_user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::doctor(&doctor_id, &doctor_user.id, 50.0, "approved")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(&appointment_id.to_string(), &doctor_id, &patient_id, "confirmed", 50.0)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.confirmed"))
        .and(body_partial_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(&appointment_id.to_string(), &doctor_id, &patient_id, "completed", 50.0)
        ])))
        .mount(&server)
        .await;

    // No open video session to force-end
    Mock::given(method("GET"))
        .and(path("/rest/v1/video_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user_id": Uuid::new_v4().to_string() }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = doctor_appointment_action(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&doctor_user),
        Json(DoctorActionRequest {
            appointment_id,
            action: "complete".to_string(),
        }),
    ).await;

    let response = result.expect("completion should succeed").0;
    assert_eq!(response["data"]["status"], "completed");
}

#[tokio::test]
async fn submit_review_rejects_duplicate() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4();

    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(&appointment_id.to_string(), &doctor_id, &patient_id, "completed", 50.0)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::review(&appointment_id.to_string(), &doctor_id, 5)
        ])))
        .mount(&server)
        .await;

    let result = submit_review(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(SubmitReviewRequest {
            appointment_id,
            rating: 4,
            comment: None,
        }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::Conflict(_));
}

#[tokio::test]
async fn submit_review_requires_completed_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let patient_id = Uuid::new_v4().to_string();

    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    // The status filter hides non-completed appointments
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = submit_review(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(SubmitReviewRequest {
            appointment_id: Uuid::new_v4(),
            rating: 4,
            comment: None,
        }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::NotFound(_));
}

#[tokio::test]
async fn join_video_rejects_non_participant() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();
    let own_patient_id = Uuid::new_v4().to_string();

    // The appointment belongs to a different patient
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "confirmed",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    mount_patient_lookup(&server, &own_patient_id, &patient_user.id).await;

    let result = join_video_session(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Query(JoinVideoQuery { appointment_id }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::Forbidden(_));
}

#[tokio::test]
async fn join_video_returns_room_for_participant() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &patient_id,
                "confirmed",
                50.0,
            )
        ])))
        .mount(&server)
        .await;

    mount_patient_lookup(&server, &patient_id, &patient_user.id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/video_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::video_session(&appointment_id.to_string(), "room-abc123def456", "active")
        ])))
        .mount(&server)
        .await;

    let result = join_video_session(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Query(JoinVideoQuery { appointment_id }),
    ).await;

    let response = result.expect("join should succeed").0;
    assert_eq!(response["data"]["roomId"], "room-abc123def456");
    assert_eq!(response["data"]["status"], "active");
}

#[tokio::test]
async fn doctor_reviews_are_public_and_paginated() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("order", "created_at.desc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-1/23")
                .set_body_json(json!([
                    MockRows::review(&Uuid::new_v4().to_string(), &doctor_id.to_string(), 5),
                    MockRows::review(&Uuid::new_v4().to_string(), &doctor_id.to_string(), 4),
                ])),
        )
        .mount(&server)
        .await;

    // No auth extractors: the listing is public
    let result = list_reviews(
        State(Arc::new(app_config)),
        Query(ListReviewsQuery {
            doctor_id,
            page: None,
            limit: None,
        }),
    ).await;

    let response = result.expect("listing should succeed").0;
    assert_eq!(response["data"]["reviews"].as_array().unwrap().len(), 2);
    assert_eq!(response["data"]["pagination"]["total"], 23);
    assert_eq!(response["data"]["pagination"]["pages"], 3);
    assert_eq!(response["data"]["pagination"]["limit"], 10);
}
