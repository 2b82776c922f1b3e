//! Router-level checks that are decided before any query runs.

use axum::{body::Body, http::{header, Request, StatusCode}, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use storefront::{config::AppConfig, payment, publisher::EventPublisher, router, AppState};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "admin-secret";
const WEBHOOK_SECRET: &str = "whsec_test";
const USER: &str = "0190a7f0-0000-7000-8000-000000000001";

fn app() -> Router {
    let config = AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://storefront@localhost/storefront_test".into()),
        "ADMIN_TOKEN" => Some(ADMIN_TOKEN.into()),
        "PAYMENT_KEY_SECRET" => Some("key_secret".into()),
        "PAYMENT_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.into()),
        _ => None,
    }).unwrap();
    let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    router(AppState::new(db, EventPublisher::disabled(), config))
}

async fn send(req: Request<Body>) -> (StatusCode, Value) {
    let resp = app().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn json_post(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("POST").uri(uri).header(header::CONTENT_TYPE, "application/json")
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (status, body) = send(Request::get("/api/v1/admin/orders").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let req = Request::get("/api/v1/admin/returns").header(header::AUTHORIZATION, "Bearer wrong").body(Body::empty()).unwrap();
    assert_eq!(send(req).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_routes_require_user_header() {
    assert_eq!(send(Request::get("/api/v1/cart").body(Body::empty()).unwrap()).await.0, StatusCode::UNAUTHORIZED);
    let req = Request::get("/api/v1/wallet").header("x-user-id", "not-a-uuid").body(Body::empty()).unwrap();
    assert_eq!(send(req).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_rejects_invalid_address() {
    let body = json!({
        "payment_method": "cod",
        "shipping_address": { "name": "", "phone": "12", "line1": "1 Main St", "city": "Pune", "state": "MH", "postal_code": "411001", "country": "IN" }
    });
    let req = json_post("/api/v1/checkout").header("x-user-id", USER).body(Body::from(body.to_string())).unwrap();
    let (status, resp) = send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
}

#[tokio::test]
async fn test_checkout_rejects_unknown_payment_method() {
    let body = json!({ "payment_method": "barter", "shipping_address": {} });
    let req = json_post("/api/v1/checkout").header("x-user-id", USER).body(Body::from(body.to_string())).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_to_cart_rejects_zero_quantity() {
    let body = json!({ "product_id": USER, "quantity": 0 });
    let req = json_post("/api/v1/cart/items").header("x-user-id", USER).body(Body::from(body.to_string())).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_requires_valid_signature() {
    let payload = json!({ "event": "payment.captured", "gateway_order_id": "order_abc", "gateway_payment_id": "pay_1" }).to_string();

    let req = json_post("/api/v1/payments/webhook").body(Body::from(payload.clone())).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);

    let req = json_post("/api/v1/payments/webhook")
        .header(payment::SIGNATURE_HEADER, "00ff").body(Body::from(payload.clone())).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);

    let signed_for_other_body = payment::sign(WEBHOOK_SECRET, b"{}").unwrap();
    let req = json_post("/api/v1/payments/webhook")
        .header(payment::SIGNATURE_HEADER, signed_for_other_body).body(Body::from(payload)).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_webhook_for_ignored_event_is_acknowledged() {
    let payload = json!({ "event": "refund.created", "gateway_order_id": "order_abc" }).to_string();
    let signature = payment::sign(WEBHOOK_SECRET, payload.as_bytes()).unwrap();
    let req = json_post("/api/v1/payments/webhook")
        .header(payment::SIGNATURE_HEADER, signature).body(Body::from(payload)).unwrap();
    let (status, body) = send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_signed_capture_without_payment_id_is_rejected() {
    for payload in [
        json!({ "event": "payment.captured", "gateway_order_id": "order_abc" }),
        json!({ "event": "payment.captured", "gateway_order_id": "order_abc", "gateway_payment_id": "  " }),
    ] {
        let payload = payload.to_string();
        let signature = payment::sign(WEBHOOK_SECRET, payload.as_bytes()).unwrap();
        let req = json_post("/api/v1/payments/webhook")
            .header(payment::SIGNATURE_HEADER, signature).body(Body::from(payload)).unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn test_admin_token_must_match_exactly() {
    for token in ["admin-secre", "admin-secret2", "ADMIN-SECRET", ""] {
        let req = Request::get("/api/v1/admin/orders")
            .header(header::AUTHORIZATION, format!("Bearer {token}")).body(Body::empty()).unwrap();
        assert_eq!(send(req).await.0, StatusCode::UNAUTHORIZED, "token {token:?}");
    }
}

#[tokio::test]
async fn test_report_rejects_unknown_period() {
    let req = Request::get("/api/v1/admin/reports/sales?period=hourly")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}")).body(Body::empty()).unwrap();
    let (status, body) = send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "unknown report period: hourly");
}

#[tokio::test]
async fn test_custom_report_needs_both_dates() {
    let req = Request::get("/api/v1/admin/reports/sales.csv?period=custom&from=2024-01-01")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}")).body(Body::empty()).unwrap();
    assert_eq!(send(req).await.0, StatusCode::BAD_REQUEST);
}
