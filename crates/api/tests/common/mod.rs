#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use contacts_api::auth::jwt::{JwtConfig, DEFAULT_ACCESS_EXPIRY_MINS, DEFAULT_REFRESH_EXPIRY_DAYS};
use contacts_api::auth::password::hash_password;
use contacts_api::avatar::{delivery_url, AvatarError, AvatarStore};
use contacts_api::config::ServerConfig;
use contacts_api::mail::{MailError, Mailer};
use contacts_api::rate_limit::ClientRateLimiter;
use contacts_api::router::build_app_router;
use contacts_api::state::AppState;
use contacts_core::tokens::generate_verification_token;
use contacts_db::models::user::{CreateUser, User};
use contacts_db::repositories::UserRepo;

/// Password used for every user created through [`create_verified_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Peer address attached to every test request.
pub const TEST_CLIENT: ([u8; 4], u16) = ([192, 0, 2, 10], 40000);

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Mailer that keeps every verification token it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// The most recent token sent to `email`.
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), token.to_string()));
        Ok(())
    }
}

/// Mailer whose every delivery fails.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_verification(&self, _to: &str, _token: &str) -> Result<(), MailError> {
        Err(MailError::Build("smtp unavailable".to_string()))
    }
}

/// Avatar store that keeps uploads in memory.
#[derive(Default)]
pub struct MemoryAvatarStore {
    uploads: Mutex<Vec<(String, String, usize)>>,
}

impl MemoryAvatarStore {
    /// `(folder, filename, byte length)` of every upload.
    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvatarStore for MemoryAvatarStore {
    async fn upload(
        &self,
        folder: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AvatarError> {
        self.uploads
            .lock()
            .unwrap()
            .push((folder.to_string(), filename.to_string(), bytes.len()));
        Ok(delivery_url("test-cloud", &format!("{folder}/avatar")))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_base_url: "http://localhost:8000".to_string(),
        cors_origins: vec![HeaderValue::from_static("http://localhost:8000")],
        request_timeout_secs: 30,
        db_connect_retries: 1,
        contact_create_per_minute: NonZeroU32::new(5).unwrap(),
        trust_forwarded_for: false,
        jwt: JwtConfig {
            secret: "integration-test-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: DEFAULT_ACCESS_EXPIRY_MINS,
            refresh_token_expiry_days: DEFAULT_REFRESH_EXPIRY_DAYS,
        },
        mail: None,
        cloudinary: None,
    }
}

/// Knobs for [`build_test_app_with`].
pub struct TestOptions {
    pub config: ServerConfig,
    pub failing_mailer: bool,
    pub avatar_store: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            config: test_config(),
            failing_mailer: false,
            avatar_store: true,
        }
    }
}

/// The router plus handles on the test doubles behind it.
pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    pub avatars: Arc<MemoryAvatarStore>,
}

impl TestApp {
    /// A fresh handle on the router for a single `oneshot` call.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with default test services.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, TestOptions::default())
}

/// Build the full application router through the production
/// [`build_app_router`], so tests exercise the same middleware stack.
pub fn build_test_app_with(pool: PgPool, options: TestOptions) -> TestApp {
    let recording = Arc::new(RecordingMailer::default());
    let avatars = Arc::new(MemoryAvatarStore::default());

    let mailer: Arc<dyn Mailer> = if options.failing_mailer {
        Arc::new(FailingMailer)
    } else {
        recording.clone()
    };
    let avatar_store: Option<Arc<dyn AvatarStore>> = if options.avatar_store {
        Some(avatars.clone())
    } else {
        None
    };

    let config = options.config;
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        mailer,
        avatars: avatar_store,
        contact_limiter: Arc::new(ClientRateLimiter::per_minute(
            config.contact_create_per_minute,
        )),
    };

    let router = build_app_router(state, &config)
        .layer(MockConnectInfo(SocketAddr::from(TEST_CLIENT)));

    TestApp {
        router,
        mailer: recording,
        avatars,
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user and mark it verified, bypassing the mail round trip.
pub async fn create_verified_user(pool: &PgPool, email: &str) -> User {
    let token = generate_verification_token();
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
            verification_token_hash: token.hash.clone(),
        },
    )
    .await
    .expect("user creation should succeed");

    UserRepo::verify_by_token_hash(pool, &token.hash)
        .await
        .expect("verification should succeed")
        .unwrap_or(user)
}

/// Log in through `POST /token/` and return the JSON body.
pub async fn login(app: Router, email: &str, password: &str) -> serde_json::Value {
    let response = post_form(app, "/token/", &[("username", email), ("password", password)]).await;
    assert_eq!(response.status(), StatusCode::OK, "login should succeed");
    body_json(response).await
}

/// Create a verified user and return it with a fresh access token.
pub async fn user_with_token(test: &TestApp, pool: &PgPool, email: &str) -> (User, String) {
    let user = create_verified_user(pool, email).await;
    let json = login(test.app(), email, TEST_PASSWORD).await;
    let token = json["access_token"]
        .as_str()
        .expect("access_token should be a string")
        .to_string();
    (user, token)
}

/// A valid contact body with the given email.
pub fn contact_body(first: &str, last: &str, email: &str, birthday: &str) -> serde_json::Value {
    serde_json::json!({
        "first_name": first,
        "last_name": last,
        "email": email,
        "phone_number": "+1 555 0100",
        "birthday": birthday,
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    request(method, uri, token)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(
        app,
        request(Method::GET, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, None, body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, json_request(Method::POST, uri, Some(token), body)).await
}

/// Like [`post_json_auth`] but with an `X-Forwarded-For` header.
pub async fn post_json_auth_forwarded(
    app: Router,
    uri: &str,
    token: &str,
    forwarded_for: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let mut request = json_request(Method::POST, uri, Some(token), body);
    request.headers_mut().insert(
        "x-forwarded-for",
        HeaderValue::from_str(forwarded_for).unwrap(),
    );
    send(app, request).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, json_request(Method::PUT, uri, Some(token), body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(
        app,
        request(Method::POST, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(
        app,
        request(Method::DELETE, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// POST an `application/x-www-form-urlencoded` body. Values must not need
/// escaping beyond `@`.
pub async fn post_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{k}={}", v.replace('@', "%40")))
        .collect::<Vec<_>>()
        .join("&");
    send(
        app,
        request(Method::POST, uri, None)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

/// POST a single-part `multipart/form-data` body.
pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    token: &str,
    field: &str,
    filename: &str,
    data: &[u8],
) -> Response<Body> {
    const BOUNDARY: &str = "contacts-test-boundary";
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: image/png\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    send(
        app,
        request(Method::POST, uri, Some(token))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
