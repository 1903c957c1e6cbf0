use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use storefront_core::adapters::InMemoryStore;
use storefront_core::config::Config;
use storefront_core::domain::{Product, Purchaser};
use storefront_core::gateway::{GatewayError, GatewayInvoiceRequest};
use storefront_core::ports::{InvoiceRepository, PaymentGateway};
use storefront_core::{create_app, AppState};

const CALLBACK_TOKEN: &str = "cb-secret";
const ADMIN_KEY: &str = "admin-secret-key";
const BUYER_TOKEN: &str = "buyer-token";
const OTHER_TOKEN: &str = "other-token";

struct StubGateway {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_invoice(&self, request: &GatewayInvoiceRequest) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().push(request.external_id.clone());
        if self.fail {
            return Err(GatewayError::Rejected {
                status: 500,
                body: "secret upstream detail".to_string(),
            });
        }
        Ok("https://pay.example/xyz".to_string())
    }
}

fn test_config() -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        gateway_base_url: "https://gateway.invalid".to_string(),
        gateway_secret_key: "xnd_test".to_string(),
        gateway_timeout_secs: 5,
        callback_token: CALLBACK_TOKEN.to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
    }
}

fn setup(gateway_fails: bool) -> (Router, Arc<InMemoryStore>, Arc<StubGateway>) {
    let store = Arc::new(InMemoryStore::new());
    store.add_product(Product {
        id: 1,
        name: "Handmade batik pattern pack for textile printing".to_string(),
        slug: "handmade-batik-pattern-pack".to_string(),
        price: 50_000,
    });
    store.add_token(
        BUYER_TOKEN,
        Purchaser {
            id: 42,
            email: "a@b.com".to_string(),
            full_name: "Budi Santoso".to_string(),
        },
    );
    store.add_token(
        OTHER_TOKEN,
        Purchaser {
            id: 7,
            email: "c@d.com".to_string(),
            full_name: "Siti Rahma".to_string(),
        },
    );

    let gateway = Arc::new(StubGateway {
        fail: gateway_fails,
        calls: Mutex::new(Vec::new()),
    });
    let state = AppState::new(
        &test_config(),
        store.clone(),
        store.clone(),
        store.clone(),
        gateway.clone(),
    );

    (create_app(state), store, gateway)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn checkout_request(product_id: i64, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/invoice/{}", product_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn callback_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/invoice/callback")
        .header("content-type", "application/json")
        .header("x-callback-token", token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_checkout_then_paid_callback() {
    let (app, store, _gateway) = setup(false);

    let (status, invoice) = send(&app, checkout_request(1, BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["payment_link"], "https://pay.example/xyz");
    assert_eq!(invoice["is_paid"], false);
    assert_eq!(invoice["expired"], false);
    assert_eq!(invoice["user_id"], 42);
    assert_eq!(invoice["detail"]["price"], 50_000);
    assert_eq!(invoice["detail"]["product_id"], 1);
    assert_eq!(store.invoice_count(), 1);
    assert_eq!(store.line_item_count(), 1);

    let external_id = invoice["external_id"].as_str().unwrap().to_string();
    let (status, paid) = send(
        &app,
        callback_request(
            CALLBACK_TOKEN,
            json!({ "external_id": external_id, "status": "PAID" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["is_paid"], true);
    assert_eq!(paid["external_id"], external_id.as_str());
    assert_eq!(paid["id"], invoice["id"]);
}

#[tokio::test]
async fn test_checkout_requires_bearer_token() {
    let (app, store, gateway) = setup(false);

    let request = Request::builder()
        .method("POST")
        .uri("/invoice/1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, checkout_request(1, "not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(store.invoice_count(), 0);
    assert!(gateway.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_unknown_product_is_404() {
    let (app, store, _gateway) = setup(false);

    let (status, body) = send(&app, checkout_request(999, BUYER_TOKEN)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(store.invoice_count(), 0);
}

#[tokio::test]
async fn test_gateway_failure_is_502_without_rows_or_details() {
    let (app, store, _gateway) = setup(true);

    let (status, body) = send(&app, checkout_request(1, BUYER_TOKEN)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["error"].as_str().unwrap().contains("secret upstream detail"));
    assert_eq!(store.invoice_count(), 0);
    assert_eq!(store.line_item_count(), 0);
}

#[tokio::test]
async fn test_callback_with_wrong_token_is_401_and_state_unchanged() {
    let (app, store, _gateway) = setup(false);
    let (_, invoice) = send(&app, checkout_request(1, BUYER_TOKEN)).await;
    let external_id = invoice["external_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        callback_request("wrong", json!({ "external_id": external_id, "status": "PAID" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let stored = store.find_by_external_id(&external_id).await.unwrap().unwrap();
    assert!(!stored.invoice.is_paid);
}

#[tokio::test]
async fn test_callback_for_unknown_invoice_is_404() {
    let (app, _store, _gateway) = setup(false);

    let (status, _) = send(
        &app,
        callback_request(
            CALLBACK_TOKEN,
            json!({ "external_id": "24-05-01-AB12345", "status": "PAID" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_with_malformed_body_is_400() {
    let (app, _store, _gateway) = setup(false);

    let (status, _) = send(
        &app,
        callback_request(CALLBACK_TOKEN, json!({ "external_id": "24-05-01-AB12345" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_status_callback_keeps_invoice_unpaid() {
    let (app, _store, _gateway) = setup(false);
    let (_, invoice) = send(&app, checkout_request(1, BUYER_TOKEN)).await;

    let (status, body) = send(
        &app,
        callback_request(
            CALLBACK_TOKEN,
            json!({ "external_id": invoice["external_id"], "status": "EXPIRED" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_paid"], false);
}

#[tokio::test]
async fn test_find_invoice_only_for_owner() {
    let (app, _store, _gateway) = setup(false);
    let (_, invoice) = send(&app, checkout_request(1, BUYER_TOKEN)).await;
    let id = invoice["id"].as_i64().unwrap();
    let external_id = invoice["external_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("/invoice/{}", id), BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["external_id"], external_id.as_str());

    let (status, body) = send(&app, get(&format!("/invoice/inv/{}", external_id), BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _) = send(&app, get(&format!("/invoice/{}", id), OTHER_TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/invoice/inv/{}", external_id), OTHER_TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_lists_own_invoices_with_page_count() {
    let (app, _store, _gateway) = setup(false);
    for _ in 0..3 {
        send(&app, checkout_request(1, BUYER_TOKEN)).await;
    }
    send(&app, checkout_request(1, OTHER_TOKEN)).await;

    let (status, body) = send(&app, get("/invoice?limit=2&page=1", BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, get("/invoice?limit=2&page=3", BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/invoice?limit=50", BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_index_requires_admin_key() {
    let (app, _store, _gateway) = setup(false);
    send(&app, checkout_request(1, BUYER_TOKEN)).await;
    send(&app, checkout_request(1, OTHER_TOKEN)).await;

    let (status, _) = send(&app, get("/admin/invoices", BUYER_TOKEN)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/admin/invoices", ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_reports_healthy_store() {
    let (app, _store, _gateway) = setup(false);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_index_without_invoices_is_404() {
    let (app, _store, _gateway) = setup(false);

    let (status, _) = send(&app, get("/invoice", BUYER_TOKEN)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registered_account_can_check_out_until_token_is_removed() {
    let (app, store, _gateway) = setup(false);

    let (status, registered) = send(
        &app,
        json_request(
            "POST",
            "/user",
            json!({ "email": "Dewi@Example.com", "fullname": "Dewi Lestari", "password": "s3cret-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["email"], "dewi@example.com");
    let first_token = registered["token"].as_str().unwrap().to_string();

    let (status, invoice) = send(&app, checkout_request(1, &first_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["user_id"], registered["id"]);

    let (status, logged_in) = send(
        &app,
        json_request(
            "GET",
            "/user/get-token",
            json!({ "email": "dewi@example.com", "password": "s3cret-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second_token = logged_in["token"].as_str().unwrap().to_string();
    assert_ne!(first_token, second_token);

    let remove = Request::builder()
        .method("DELETE")
        .uri("/user/remove-token")
        .header("Authorization", format!("Bearer {}", first_token))
        .body(Body::empty())
        .unwrap();
    let (status, removed) = send(&app, remove).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["id"], registered["id"]);

    let (status, _) = send(&app, checkout_request(1, &first_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, checkout_request(1, &second_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.invoice_count(), 2);
}

#[tokio::test]
async fn test_register_with_taken_email_is_409() {
    let (app, _store, _gateway) = setup(false);
    let body = json!({ "email": "dewi@example.com", "fullname": "Dewi", "password": "pw" });

    let (status, _) = send(&app, json_request("POST", "/user", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, json_request("POST", "/user", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_get_token_with_wrong_password_is_401() {
    let (app, _store, _gateway) = setup(false);
    send(
        &app,
        json_request(
            "POST",
            "/user",
            json!({ "email": "dewi@example.com", "fullname": "Dewi", "password": "right" }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/user/get-token",
            json!({ "email": "dewi@example.com", "password": "wrong" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_remove_token_requires_valid_token() {
    let (app, _store, _gateway) = setup(false);

    let request = Request::builder()
        .method("DELETE")
        .uri("/user/remove-token")
        .header("Authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
