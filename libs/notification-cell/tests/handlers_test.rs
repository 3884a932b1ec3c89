use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use notification_cell::handlers::*;
use notification_cell::models::MarkReadRequest;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

fn auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn notification_row(user_id: &str, is_read: bool) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "user_id": user_id,
        "title": "Appointment Confirmed",
        "message": "A patient has paid for their appointment.",
        "type": "payment",
        "link": "/doctor/appointments",
        "is_read": is_read,
        "created_at": "2025-06-01T10:00:00Z"
    })
}

#[tokio::test]
async fn listing_reports_unread_count() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", patient_user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            notification_row(&patient_user.id, false),
            notification_row(&patient_user.id, false),
            notification_row(&patient_user.id, true),
        ])))
        .mount(&server)
        .await;

    let result = list_notifications(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
    ).await;

    let response = result.expect("listing should succeed").0;
    assert_eq!(response["data"]["notifications"].as_array().unwrap().len(), 3);
    assert_eq!(response["data"]["unreadCount"], 2);
}

#[tokio::test]
async fn single_mark_read_is_owner_scoped() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));
    let notification_id = Uuid::new_v4();

    // Someone else's notification: the owner filter matches nothing
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("id", format!("eq.{}", notification_id)))
        .and(query_param("user_id", format!("eq.{}", patient_user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = mark_notifications_read(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(MarkReadRequest {
            notification_id: Some(notification_id),
            action: None,
        }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::NotFound(_));
}

#[tokio::test]
async fn read_all_marks_everything_unread() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("is_read", "eq.false"))
        .and(body_partial_json(json!({ "is_read": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let result = mark_notifications_read(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(MarkReadRequest {
            notification_id: None,
            action: Some("read-all".to_string()),
        }),
    ).await;

    let response = result.expect("read-all should succeed").0;
    assert!(response["success"].as_bool().unwrap());
}

#[tokio::test]
async fn mark_read_without_id_or_action_is_bad_request() {
    let config = TestConfig::default();
    let app_config = config.to_app_config();

    let patient_user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient_user, &app_config.supabase_jwt_secret, Some(24));

    let result = mark_notifications_read(
        State(Arc::new(app_config)),
        auth_header(&token),
        user_extension(&patient_user),
        Json(MarkReadRequest {
            notification_id: None,
            action: None,
        }),
    ).await;

    assert_matches!(result.unwrap_err(), AppError::BadRequest(_));
}
