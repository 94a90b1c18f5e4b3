//! End-to-end HTTP tests against the real router.
//!
//! These need a running Postgres (`DATABASE_URL` pointing at a scratch
//! database) and are `#[ignore]`d by default; run with `cargo test -- --ignored`.

use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch db");
        let pool = finbook_store::pool::connect(&url).await.expect("connect");
        finbook_store::migrations::run(&pool).await.expect("migrations");

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = finbook_api::app::build_app(pool, "test-secret".to_string())
            .await
            .expect("build app");
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
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register_and_login(client: &reqwest::Client, base_url: &str) -> String {
    let email = format!("{}@test.local", uuid::Uuid::now_v7());
    let resp = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({
            "email": email,
            "display_name": "Test User",
            "password": "correct horse battery staple",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore]
async fn unauthenticated_requests_are_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/accounts", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Health stays public.
    let resp = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn expense_lifecycle_over_http() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &server.base_url).await;

    let resp = client
        .post(format!("{}/accounts", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "checking",
            "kind": "checking",
            "currency": "USD",
            "opening_balance": "1000.00",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let account: serde_json::Value = resp.json().await.unwrap();
    let account_id = account["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/transactions", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "account_id": account_id,
            "kind": "expense",
            "category": "groceries",
            "amount": "75.25",
            "currency": "USD",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .get(format!("{}/accounts/{account_id}", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(account["balance"], "924.75");
    assert_eq!(account["balance_minor"], 92_475);
}

#[tokio::test]
#[ignore]
async fn overdraft_returns_unprocessable_and_leaves_balance() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &server.base_url).await;

    let resp = client
        .post(format!("{}/accounts", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "cash",
            "kind": "cash",
            "currency": "USD",
            "opening_balance": "50.00",
        }))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = resp.json().await.unwrap();
    let account_id = account["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/transactions", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "account_id": account_id,
            "kind": "expense",
            "category": "rent",
            "amount": "60.00",
            "currency": "USD",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_funds");

    let resp = client
        .get(format!("{}/accounts/{account_id}", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(account["balance"], "50.00");
}

#[tokio::test]
#[ignore]
async fn borrowing_payment_flow_over_http() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &server.base_url).await;

    let resp = client
        .post(format!("{}/borrowings", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "direction": "borrowed",
            "counterparty": "alice",
            "principal": "200.00",
            "currency": "USD",
            "due_at": "2030-01-01T00:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let borrowing: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(borrowing["status"], "pending");
    let id = borrowing["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/borrowings/{id}/payments", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "amount": "200.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let borrowing: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(borrowing["status"], "paid");

    // A settled borrowing rejects further payments.
    let resp = client
        .post(format!("{}/borrowings/{id}/payments", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "amount": "0.01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "borrowing_settled");
}

#[tokio::test]
#[ignore]
async fn users_cannot_see_each_others_accounts() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let alice = register_and_login(&client, &server.base_url).await;
    let bob = register_and_login(&client, &server.base_url).await;

    let resp = client
        .post(format!("{}/accounts", server.base_url))
        .bearer_auth(&alice)
        .json(&json!({ "name": "private", "kind": "savings", "currency": "USD" }))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = resp.json().await.unwrap();
    let account_id = account["id"].as_str().unwrap();

    let resp = client
        .get(format!("{}/accounts/{account_id}", server.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
