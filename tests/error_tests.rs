// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_manager::error::{AppError, Notification, NotificationLevel};
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[tokio::test]
async fn test_error_body_carries_code_and_notification_text() {
    let response = AppError::RemoteUnavailable("connection reset".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "remote_unavailable");
    assert_eq!(
        body["details"],
        "Could not reach the activity service. Please try again."
    );
}

#[tokio::test]
async fn test_internal_error_hides_details() {
    let response = AppError::Internal(anyhow::anyhow!("secret path /etc/x")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "internal_error");
    assert!(body.get("details").is_none());
}

#[test]
fn test_every_error_becomes_an_error_notification() {
    let errors = [
        AppError::RemoteUnavailable("x".to_string()),
        AppError::EntityNotFound("x".to_string()),
        AppError::InvalidOperation("x".to_string()),
        AppError::MalformedResponse("x".to_string()),
        AppError::BadRequest("x".to_string()),
    ];
    for err in &errors {
        assert_eq!(Notification::from(err).level, NotificationLevel::Error);
    }
}
