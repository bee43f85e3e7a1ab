mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn tenant_is_forbidden_from_admin_endpoints_before_store_access() {
    let app = TestApp::new();
    let tenant = app.tenant_token("tenant-a");

    let cases = [
        ("GET", "/stats/rent-status", None),
        ("GET", "/stats/income/monthly", None),
        ("GET", "/payments/pending", None),
        ("GET", "/payments/pending-count", None),
        (
            "PUT",
            "/payments/settings",
            Some(json!({ "wechatQrCodeUrl": "https://qr", "paymentNote": "n" })),
        ),
        (
            "POST",
            "/payments/records",
            Some(json!({ "tenantId": "tenant-a", "period": "2024-03", "amountDue": 100 })),
        ),
        (
            "POST",
            "/payments/records/tenant-a/2024-03/confirm",
            Some(json!({ "confirmed": true })),
        ),
        (
            "POST",
            "/payments/records/tenant-a/2024-03/note",
            Some(json!({ "note": "x" })),
        ),
    ];

    for (method, uri, body) in cases {
        let (status, body) = app.request(method, uri, Some(&tenant), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    assert_eq!(app.spy.calls(), 0);
}

#[tokio::test]
async fn missing_or_invalid_credentials_are_unauthenticated() {
    let app = TestApp::new();

    let (status, body) = app.get("/payments/settings", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/payments/my-records", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.spy.calls(), 0);
}

#[tokio::test]
async fn tenant_cannot_submit_proof_for_another_tenant() {
    let app = TestApp::new();
    app.open("tenant-b", "2024-03", 1000).await;
    let calls_before = app.spy.calls();

    let intruder = app.tenant_token("tenant-a");
    let (status, body) = app
        .post(
            "/payments/records/tenant-b/2024-03/proof",
            Some(&intruder),
            json!({ "proofUrl": "https://img/fake.png" }),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(app.spy.calls(), calls_before);

    let record = app.ledger.get("tenant-b", common::period("2024-03")).await.unwrap();
    assert!(record.proof_url.is_none());
}

#[tokio::test]
async fn tenant_cannot_read_another_tenants_record() {
    let app = TestApp::new();
    app.open("tenant-b", "2024-03", 1000).await;

    let intruder = app.tenant_token("tenant-a");
    let (status, _) = app
        .get("/payments/records/tenant-b/2024-03", Some(&intruder))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner = app.tenant_token("tenant-b");
    let (status, body) = app
        .get("/payments/records/tenant-b/2024-03", Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "unpaid");
}

#[tokio::test]
async fn authorization_runs_before_input_validation() {
    let app = TestApp::new();

    // Malformed period and body, but no credential: the gate answers first.
    let (status, _) = app
        .request(
            "POST",
            "/payments/records/tenant-a/not-a-period/proof",
            None,
            Some(json!({ "wrong": true })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let tenant = app.tenant_token("tenant-a");
    let (status, _) = app
        .get("/stats/rent-status?period=garbage", Some(&tenant))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(app.spy.calls(), 0);
}

#[tokio::test]
async fn admin_may_act_on_behalf_of_a_tenant() {
    let app = TestApp::new();
    app.open("tenant-a", "2024-03", 1000).await;

    let admin = app.admin_token();
    let (status, body) = app
        .post(
            "/payments/records/tenant-a/2024-03/proof",
            Some(&admin),
            json!({ "proofUrl": "https://img/cash-receipt.png" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "proof_submitted");
}
