use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use storefront_api::config::ApiConfig;
use storefront_auth::{JwtClaims, TokenKind};
use storefront_core::UserId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = storefront_api::app::build_app(&ApiConfig::for_tests(jwt_secret))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.unwrap()).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.unwrap()).await
    }

    /// Register a user and return its access and refresh tokens.
    async fn register(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/register/",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "securepassword",
                    "password2": "securepassword",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["access"].as_str().unwrap().to_string(),
            body["refresh"].as_str().unwrap().to_string(),
        )
    }

    async fn create_product(&self, token: &str, name: &str, price: &str) -> String {
        let (status, body) = self
            .post(
                "/products/",
                Some(token),
                json!({
                    "name": name,
                    "description": "A test product",
                    "price": price,
                    "category": "Test",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read(resp: reqwest::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let text = resp.text().await.unwrap();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, body)
}

fn mint_jwt(secret: &str, kind: TokenKind, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims {
        sub: UserId::new(),
        username: "ghost".to_string(),
        kind,
        iat: issued_at.timestamp(),
        exp: (issued_at + ttl).timestamp(),
        jti: uuid::Uuid::now_v7(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn(SECRET).await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_rejects_mismatched_passwords() {
    let server = TestServer::spawn(SECRET).await;
    let (status, body) = server
        .post(
            "/register/",
            None,
            json!({
                "username": "testuser",
                "email": "test@example.com",
                "password": "securepassword",
                "password2": "differentpassword",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["password"][0], "Password fields didn't match.");
}

#[tokio::test]
async fn register_returns_user_and_tokens() {
    let server = TestServer::spawn(SECRET).await;
    let (status, body) = server
        .post(
            "/register/",
            None,
            json!({
                "username": "testuser",
                "email": "test@example.com",
                "password": "securepassword",
                "password2": "securepassword",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "testuser");
    assert_eq!(body["email"], "test@example.com");
    assert!(body["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn duplicate_username_is_a_field_error() {
    let server = TestServer::spawn(SECRET).await;
    server.register("alice").await;

    let (status, body) = server
        .post(
            "/register/",
            None,
            json!({
                "username": "alice",
                "password": "anotherpassword",
                "password2": "anotherpassword",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array());
}

#[tokio::test]
async fn login_issues_tokens_only_for_valid_credentials() {
    let server = TestServer::spawn(SECRET).await;
    server.register("alice").await;

    let (status, body) = server
        .post("/login/", None, json!({"username": "alice", "password": "securepassword"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());

    let (status, _) = server
        .post("/login/", None, json!({"username": "alice", "password": "wrongpassword"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .post("/login/", None, json!({"username": "nobody", "password": "securepassword"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_yields_working_access_token() {
    let server = TestServer::spawn(SECRET).await;
    let (access, refresh) = server.register("alice").await;

    // A refresh token is not an access token.
    let (status, _) = server.get("/orders/", Some(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // And an access token cannot be refreshed.
    let (status, _) = server
        .post("/token/refresh/", None, json!({"refresh": access}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post("/token/refresh/", None, json!({"refresh": refresh}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access"].as_str().unwrap();

    let (status, _) = server.get("/orders/", Some(fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_or_forged_tokens_are_rejected() {
    let server = TestServer::spawn(SECRET).await;

    let expired = mint_jwt(
        SECRET,
        TokenKind::Access,
        Utc::now() - ChronoDuration::hours(2),
        ChronoDuration::minutes(5),
    );
    let (status, _) = server.get("/orders/", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = mint_jwt(
        "some-other-secret",
        TokenKind::Access,
        Utc::now(),
        ChronoDuration::minutes(5),
    );
    let (status, _) = server.get("/orders/", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An unusable token is rejected even where anonymous reads are allowed.
    let (status, _) = server.get("/products/", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn products_are_public_to_read_but_not_to_write() {
    let server = TestServer::spawn(SECRET).await;

    let (status, body) = server.get("/products/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = server
        .post(
            "/products/",
            None,
            json!({"name": "Mug", "price": "4.50", "category": "Kitchen"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = server.register("alice").await;
    let id = server.create_product(&token, "Mug", "4.50").await;

    let (status, body) = server.get(&format!("/products/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Mug");
    assert_eq!(body["price"], "4.50");
}

#[tokio::test]
async fn product_update_and_validation() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let id = server.create_product(&token, "Mug", "4.50").await;

    let resp = server
        .client
        .patch(server.url(&format!("/products/{id}/")))
        .bearer_auth(&token)
        .json(&json!({"price": "5.25"}))
        .send()
        .await
        .unwrap();
    let (status, body) = read(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "5.25");
    assert_eq!(body["name"], "Mug");

    let resp = server
        .client
        .put(server.url(&format!("/products/{id}/")))
        .bearer_auth(&token)
        .json(&json!({"name": "Cup"}))
        .send()
        .await
        .unwrap();
    let (status, body) = read(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["price"].is_array());

    let (status, body) = server
        .post(
            "/products/",
            Some(&token),
            json!({"name": "Bad", "price": "-1.00", "category": "Test"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["price"].is_array());
}

#[tokio::test]
async fn order_total_is_computed_by_the_server() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let product = server.create_product(&token, "Test Product", "10.99").await;

    let (status, body) = server
        .post(
            "/orders/",
            Some(&token),
            json!({
                "order_items": [{"product_id": product, "quantity": 2}],
                "total": "0.01",
                "status": "shipped",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["total"], "21.98");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["order_items"][0]["quantity"], 2);
    assert_eq!(body["order_items"][0]["product"]["id"], product.as_str());

    let (status, body) = server.get("/orders/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn order_with_missing_product_creates_nothing() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let product = server.create_product(&token, "Mug", "4.50").await;
    let missing = uuid::Uuid::now_v7().to_string();

    let (status, body) = server
        .post(
            "/orders/",
            Some(&token),
            json!({
                "order_items": [
                    {"product_id": product, "quantity": 1},
                    {"product_id": missing, "quantity": 1},
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["order_items[1].product_id"].is_array());

    let (status, _) = server
        .post("/orders/", Some(&token), json!({"order_items": []}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server.get("/orders/", Some(&token)).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn orders_are_isolated_per_user() {
    let server = TestServer::spawn(SECRET).await;
    let (alice, _) = server.register("alice").await;
    let (bob, _) = server.register("bob").await;
    let product = server.create_product(&alice, "Mug", "4.50").await;

    let (status, _) = server
        .post(
            "/orders/",
            Some(&alice),
            json!({"order_items": [{"product_id": product, "quantity": 1}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = server.get("/orders/", Some(&bob)).await;
    assert_eq!(body, json!([]));

    let (status, _) = server.get("/orders/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn referenced_products_cannot_be_deleted() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let ordered = server.create_product(&token, "Mug", "4.50").await;
    let unused = server.create_product(&token, "Cup", "3.00").await;

    let (status, _) = server
        .post(
            "/orders/",
            Some(&token),
            json!({"order_items": [{"product_id": ordered, "quantity": 1}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let delete = |id: String| {
        server
            .client
            .delete(server.url(&format!("/products/{id}/")))
            .bearer_auth(&token)
            .send()
    };

    let resp = delete(ordered.clone()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = delete(unused.clone()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, _) = server.get(&format!("/products/{unused}/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_and_bodies_are_client_errors() {
    let server = TestServer::spawn(SECRET).await;

    let (status, _) = server.get("/products/not-a-uuid/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.get("/nowhere/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let resp = server
        .client
        .post(server.url("/login/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let (status, body) = read(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "parse_error");
}

#[tokio::test]
async fn valid_token_for_unknown_user_is_rejected() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let product = server.create_product(&token, "Mug", "4.50").await;

    let stranger = mint_jwt(
        SECRET,
        TokenKind::Access,
        Utc::now(),
        ChronoDuration::minutes(5),
    );

    let (status, body) = server
        .post(
            "/products/",
            Some(&stranger),
            json!({"name": "Cup", "price": "3.00", "category": "Kitchen"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");

    let (status, _) = server.get("/orders/", Some(&stranger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .post(
            "/orders/",
            Some(&stranger),
            json!({"order_items": [{"product_id": product, "quantity": 1}]}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_total_must_fit_in_a_price() {
    let server = TestServer::spawn(SECRET).await;
    let (token, _) = server.register("alice").await;
    let product = server.create_product(&token, "Yacht", "99999999.99").await;

    let (status, body) = server
        .post(
            "/orders/",
            Some(&token),
            json!({"order_items": [{"product_id": product, "quantity": 2}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["order_items"][0], "Order total is too large.");

    let (_, body) = server.get("/orders/", Some(&token)).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn login_accepts_username_padded_like_registration() {
    let server = TestServer::spawn(SECRET).await;
    let (status, body) = server
        .post(
            "/register/",
            None,
            json!({
                "username": " bob ",
                "password": "securepassword",
                "password2": "securepassword",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "bob");

    let (status, body) = server
        .post("/login/", None, json!({"username": " bob ", "password": "securepassword"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["access"].is_string());
}
