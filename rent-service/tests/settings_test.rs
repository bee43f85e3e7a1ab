mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn settings_default_to_empty() {
    let app = TestApp::new();

    let (status, body) = app
        .get("/payments/settings", Some(&app.tenant_token("tenant-a")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["wechatQrCodeUrl"].is_null());
    assert!(body["data"]["paymentNote"].is_null());
}

#[tokio::test]
async fn admin_replaces_settings_and_tenants_read_them() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let (status, body) = app
        .put(
            "/payments/settings",
            Some(&admin),
            json!({ "wechatQrCodeUrl": "https://files/qr.png", "paymentNote": "Pay by the 5th" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["wechatQrCodeUrl"], "https://files/qr.png");
    assert!(!body["data"]["updatedAt"].is_null());

    // A second write replaces the whole object.
    app.put(
        "/payments/settings",
        Some(&admin),
        json!({ "paymentNote": "Pay by the 10th" }),
    )
    .await;

    let (status, body) = app
        .get("/payments/settings", Some(&app.tenant_token("tenant-a")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["wechatQrCodeUrl"].is_null());
    assert_eq!(body["data"]["paymentNote"], "Pay by the 10th");
}

#[tokio::test]
async fn malformed_settings_body_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .put(
            "/payments/settings",
            Some(&app.admin_token()),
            json!({ "paymentNote": 42 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
