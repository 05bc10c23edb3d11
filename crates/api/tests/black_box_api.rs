use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use storefront_alerts::LowStockPolicy;
use storefront_api::app::{build_router, services::AppServices};
use storefront_auth::{JwtClaims, Role};
use storefront_catalog::Product;
use storefront_core::{CategoryId, Money, ProductId, UserId};
use storefront_infra::store::{CatalogStore, InMemoryStore};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Same router as prod over a shared in-memory store, on an ephemeral port.
    async fn spawn(store: InMemoryStore) -> Self {
        let services = AppServices::in_memory(store, LowStockPolicy::enabled());
        let app = build_router(Arc::new(services), JWT_SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: &str, roles: Vec<Role>) -> String {
    let now = Utc::now() - ChronoDuration::seconds(1);
    let claims = JwtClaims {
        sub: UserId::parse(sub).unwrap(),
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn customer(sub: &str) -> String {
    mint_jwt(JWT_SECRET, sub, vec![Role::customer()])
}

fn admin() -> String {
    mint_jwt(JWT_SECRET, "root", vec![Role::admin()])
}

async fn seed(store: &InMemoryStore, id: i64, name: &str, cents: i64, stock: i32) {
    let product = Product::new(
        ProductId::from_raw(id),
        name,
        Money::new(Decimal::new(cents, 2)).unwrap(),
        stock,
        CategoryId::from_raw(1),
    )
    .unwrap();
    store.put_product(&product).await.unwrap();
}

async fn add_to_cart(client: &reqwest::Client, srv: &TestServer, token: &str, user: &str, product_id: i64, quantity: i32) {
    let res = client
        .post(srv.url(&format!("/cart/{user}/items")))
        .bearer_auth(token)
        .json(&json!({ "product_id": product_id, "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_public_and_tagged_with_request_id() {
    let srv = TestServer::spawn(InMemoryStore::new()).await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["store"], "in_memory");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn(InMemoryStore::new()).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let forged = mint_jwt("other-secret", "alice", vec![Role::admin()]);
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn(InMemoryStore::new()).await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(admin())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], "root");
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn cart_to_order_checkout() {
    let store = InMemoryStore::new();
    seed(&store, 1, "A", 5000, 10).await;
    seed(&store, 2, "B", 3000, 10).await;
    let srv = TestServer::spawn(store.clone()).await;
    let client = reqwest::Client::new();
    let alice = customer("alice");

    add_to_cart(&client, &srv, &alice, "alice", 1, 2).await;
    add_to_cart(&client, &srv, &alice, "alice", 2, 1).await;

    let cart: serde_json::Value = client
        .get(srv.url("/cart/alice"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["items"][0]["product_name"], "A");

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&alice)
        .json(&json!({ "user_id": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let order_id = created["order_id"].as_i64().unwrap();

    let order: serde_json::Value = client
        .get(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(order["total_price"], "130.00");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    let cart: serde_json::Value = client
        .get(srv.url("/cart/alice"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(cart["items"].as_array().unwrap().is_empty());

    let history: serde_json::Value = client
        .get(srv.url("/orders/user/alice?page=1&page_size=5"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_count"], 1);

    let stock = store
        .get_product(ProductId::from_raw(1))
        .await
        .unwrap()
        .unwrap()
        .stock_quantity();
    assert_eq!(stock, 8);
}

#[tokio::test]
async fn checkout_failures_map_to_status_codes() {
    let store = InMemoryStore::new();
    seed(&store, 3, "C", 1000, 2).await;
    let srv = TestServer::spawn(store).await;
    let client = reqwest::Client::new();
    let bob = customer("bob");

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&bob)
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "empty_cart");

    add_to_cart(&client, &srv, &bob, "bob", 3, 5).await;
    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&bob)
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["message"], "Not enough stock for 'C'.");
}

#[tokio::test]
async fn cart_errors_map_to_status_codes() {
    let store = InMemoryStore::new();
    seed(&store, 1, "A", 100, 1).await;
    let srv = TestServer::spawn(store).await;
    let client = reqwest::Client::new();
    let carol = customer("carol");

    let res = client
        .post(srv.url("/cart/carol/items/1/decrease"))
        .bearer_auth(&carol)
        .json(&json!({ "amount": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "cart_not_found");

    add_to_cart(&client, &srv, &carol, "carol", 1, 1).await;

    let res = client
        .post(srv.url("/cart/carol/items/9/decrease"))
        .bearer_auth(&carol)
        .json(&json!({ "amount": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/cart/carol/items/not-a-number/decrease"))
        .bearer_auth(&carol)
        .json(&json!({ "amount": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/cart/carol/items"))
        .bearer_auth(&carol)
        .json(&json!({ "product_id": 42, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .delete(srv.url("/cart/carol"))
        .bearer_auth(&carol)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn customers_are_confined_to_their_own_resources() {
    let store = InMemoryStore::new();
    seed(&store, 1, "A", 100, 10).await;
    let srv = TestServer::spawn(store).await;
    let client = reqwest::Client::new();
    let alice = customer("alice");
    let bob = customer("bob");

    add_to_cart(&client, &srv, &alice, "alice", 1, 1).await;

    for path in ["/cart/alice", "/orders", "/stock-alerts", "/orders/user/alice"] {
        let res = client.get(srv.url(path)).bearer_auth(&bob).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "GET {path}");
    }

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&bob)
        .json(&json!({ "user_id": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Administrators may act for anyone.
    let res = client.get(srv.url("/cart/alice")).bearer_auth(admin()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&alice)
        .json(&json!({ "user_id": "alice" }))
        .send()
        .await
        .unwrap();
    let order_id = res.json::<serde_json::Value>().await.unwrap()["order_id"]
        .as_i64()
        .unwrap();

    let res = client
        .get(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client.get(srv.url("/orders/999")).bearer_auth(admin()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stock_alert_lifecycle() {
    let store = InMemoryStore::new();
    seed(&store, 2, "Headphones", 19999, 6).await;
    let srv = TestServer::spawn(store).await;
    let client = reqwest::Client::new();
    let dave = customer("dave");
    let root = admin();

    add_to_cart(&client, &srv, &dave, "dave", 2, 2).await;
    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&dave)
        .json(&json!({ "user_id": "dave" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let alerts: serde_json::Value = client
        .get(srv.url("/stock-alerts"))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["product_name"], "Headphones");
    assert_eq!(alerts[0]["quantity_at_trigger"], 4);
    let id = alerts[0]["id"].as_i64().unwrap();

    let count: serde_json::Value = client
        .get(srv.url("/stock-alerts/unacknowledged/count"))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["count"], 1);

    let res = client
        .put(srv.url(&format!("/stock-alerts/{id}/acknowledge")))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let alert: serde_json::Value = client
        .get(srv.url(&format!("/stock-alerts/{id}")))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alert["is_acknowledged"], true);

    let res = client
        .delete(srv.url(&format!("/stock-alerts/{id}")))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/stock-alerts/{id}")))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
