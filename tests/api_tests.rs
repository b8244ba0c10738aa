//! End-to-end router tests: extractors, middleware and error bodies

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bazaar_server::auth::AuthService;
use bazaar_server::models::User;
use bazaar_server::order::PaymentMethod;
use bazaar_server::routes;

use common::{captured_event, order_request, session_token, webhook_signature, Harness};

fn app(h: &Harness) -> Router {
    let fast_auth = AuthService::new(h.store.clone(), &h.config).with_hash_cost(4);
    routes::app(h.app_state().with_auth_service(fast_auth))
}

fn authed(method: &str, uri: &str, user: &User) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("token={}", session_token(user)))
}

fn json_body(value: Value) -> Body {
    Body::from(serde_json::to_vec(&value).unwrap())
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_store() {
    let h = Harness::new();

    let response = app(&h)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().contains_key("x-request-id"));
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cors_preflight_passes_through_stack() {
    let h = Harness::new();

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/orders")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let h = Harness::new();

    let response = app(&h)
        .oneshot(Request::get("/api/orders/my").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_buyer_cannot_use_admin_routes() {
    let h = Harness::new();
    let buyer = h.buyer().await;

    let response = app(&h)
        .oneshot(authed("GET", "/api/orders", &buyer).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_checkout_over_http() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 3).await;
    let request = order_request(&product, 2, 200, PaymentMethod::CashOnDelivery);

    let response = app(&h)
        .oneshot(
            authed("POST", "/api/orders", &buyer)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["payment_method"], "COD");
    assert_eq!(h.stock_of(&product).await, 1);
}

#[tokio::test]
async fn test_out_of_stock_is_conflict() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 1).await;
    let request = order_request(&product, 2, 0, PaymentMethod::CashOnDelivery);

    let response = app(&h)
        .oneshot(
            authed("POST", "/api/orders", &buyer)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_webhook_signature_gate() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 3).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::Gateway))
        .await
        .unwrap();
    let intent = h
        .payments
        .create_remote_intent(buyer.id, order.id)
        .await
        .unwrap();
    let body = captured_event(&intent.remote_order_id, "pay_1");

    let rejected = app(&h)
        .oneshot(
            Request::post("/api/webhooks/gateway")
                .header("x-razorpay-signature", "00")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let accepted = app(&h)
        .oneshot(
            Request::post("/api/webhooks/gateway")
                .header("x-razorpay-signature", webhook_signature(&body))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    let ack = read_json(accepted).await;
    assert_eq!(ack, json!({ "status": "ok", "outcome": "processed" }));
}

#[tokio::test]
async fn test_csv_export_for_admin() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let admin = h.admin().await;
    let product = h.product(&seller, 500, 3).await;
    h.orders
        .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let response = app(&h)
        .oneshot(
            authed("GET", "/api/orders/export/csv", &admin)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/csv"));
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().next(), Some(bazaar_server::order::CSV_HEADER));
    assert_eq!(text.lines().count(), 2);
}

#[tokio::test]
async fn test_register_login_and_revoke_sessions() {
    let h = Harness::new();
    let app = app(&h);

    let register = app
        .clone()
        .oneshot(
            Request::post("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({
                    "name": "Meera",
                    "phone": "9876543210",
                    "password": "correct horse"
                })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::CREATED);

    let login = app
        .clone()
        .oneshot(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({
                    "phone": "9876543210",
                    "password": "correct horse"
                })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let set_cookie = login
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let me = app
        .clone()
        .oneshot(
            Request::get("/api/auth/me")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(read_json(me).await["phone"], "9876543210");

    let revoke = app
        .clone()
        .oneshot(
            Request::post("/api/auth/logout-all")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(revoke.status(), StatusCode::OK);

    let stale = app
        .oneshot(
            Request::get("/api/auth/me")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let h = Harness::new();
    let app = app(&h);

    app.clone()
        .oneshot(
            Request::post("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({
                    "name": "Meera",
                    "phone": "9123456780",
                    "password": "correct horse"
                })))
                .unwrap(),
        )
        .await
        .unwrap();

    let login = app
        .oneshot(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({
                    "phone": "9123456780",
                    "password": "battery staple"
                })))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
    assert!(login.headers().get(header::SET_COOKIE).is_none());
}
