//! HTTP-level integration tests for registration, verification and tokens.

mod common;

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_with, create_verified_user, get, get_auth, login,
    post_auth, post_form, post_json, TestOptions, TEST_PASSWORD,
};
use contacts_db::repositories::UserRepo;
use sqlx::PgPool;

fn register_body(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "email": email, "password": password })
}

// ---------------------------------------------------------------------------
// Registration and verification
// ---------------------------------------------------------------------------

/// Register, verify through the mailed token, then log in.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_verify_login_flow(pool: PgPool) {
    let test = build_test_app(pool.clone());

    let response = post_json(
        test.app(),
        "/register/",
        register_body("new@example.com", TEST_PASSWORD),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["msg"],
        "User created. Please check your email to verify your account."
    );

    let token = test
        .mailer
        .token_for("new@example.com")
        .expect("a verification token should have been mailed");
    assert_eq!(token.len(), 48);

    // Unverified accounts cannot log in yet.
    let response = post_form(
        test.app(),
        "/token/",
        &[("username", "new@example.com"), ("password", TEST_PASSWORD)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get(test.app(), &format!("/verify/{token}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["msg"], "Account verified successfully");

    let json = login(test.app(), "new@example.com", TEST_PASSWORD).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["token_type"], "bearer");
}

/// The stored token is a hash, never the mailed plaintext.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_stores_token_hash(pool: PgPool) {
    let test = build_test_app(pool.clone());
    post_json(
        test.app(),
        "/register/",
        register_body("hash@example.com", TEST_PASSWORD),
    )
    .await;

    let plaintext = test.mailer.token_for("hash@example.com").unwrap();
    let user = UserRepo::find_by_email(&pool, "hash@example.com")
        .await
        .unwrap()
        .unwrap();
    let stored = user.verification_token_hash.unwrap();
    assert_ne!(stored, plaintext);
    assert_eq!(stored, contacts_core::tokens::hash_token(&plaintext));
    assert_ne!(user.password_hash, TEST_PASSWORD);
}

/// Email addresses are normalized before storage and lookup.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_normalizes_email(pool: PgPool) {
    let test = build_test_app(pool.clone());
    post_json(
        test.app(),
        "/register/",
        register_body("  Mixed@Example.COM ", TEST_PASSWORD),
    )
    .await;

    assert!(UserRepo::find_by_email(&pool, "mixed@example.com")
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_duplicate_email(pool: PgPool) {
    create_verified_user(&pool, "taken@example.com").await;
    let test = build_test_app(pool);

    let response = post_json(
        test.app(),
        "/register/",
        register_body("taken@example.com", TEST_PASSWORD),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email already registered");
    assert_eq!(test.mailer.sent_count(), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_validation(pool: PgPool) {
    let test = build_test_app(pool);

    let response = post_json(test.app(), "/register/", register_body("a@example.com", "short")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Password should be at least 8 characters long"));

    let response = post_json(test.app(), "/register/", register_body("not-an-email", TEST_PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A failed delivery rolls the account back so the address stays free.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_mail_failure_removes_user(pool: PgPool) {
    let test = build_test_app_with(
        pool.clone(),
        TestOptions {
            failing_mailer: true,
            ..TestOptions::default()
        },
    );

    let response = post_json(
        test.app(),
        "/register/",
        register_body("bounce@example.com", TEST_PASSWORD),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(UserRepo::find_by_email(&pool, "bounce@example.com")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_verify_invalid_token(pool: PgPool) {
    let test = build_test_app(pool);

    let response = get(test.app(), "/verify/not-a-real-token").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid token");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_verify_token_is_single_use(pool: PgPool) {
    let test = build_test_app(pool);
    post_json(
        test.app(),
        "/register/",
        register_body("once@example.com", TEST_PASSWORD),
    )
    .await;
    let token = test.mailer.token_for("once@example.com").unwrap();

    let first = get(test.app(), &format!("/verify/{token}")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = get(test.app(), &format!("/verify/{token}")).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_wrong_password(pool: PgPool) {
    create_verified_user(&pool, "pw@example.com").await;
    let test = build_test_app(pool);

    let response = post_form(
        test.app(),
        "/token/",
        &[("username", "pw@example.com"), ("password", "incorrect-password")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    assert_eq!(body_json(response).await["error"], "Incorrect username or password");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_unknown_user(pool: PgPool) {
    let test = build_test_app(pool);

    let response = post_form(
        test.app(),
        "/token/",
        &[("username", "ghost@example.com"), ("password", TEST_PASSWORD)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Incorrect username or password");
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_issues_access_token(pool: PgPool) {
    create_verified_user(&pool, "refresh@example.com").await;
    let test = build_test_app(pool);
    let tokens = login(test.app(), "refresh@example.com", TEST_PASSWORD).await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap();

    let response = post_auth(test.app(), "/token/refresh/", refresh_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["token_type"], "bearer");

    // The new access token works on protected routes.
    let access = json["access_token"].as_str().unwrap();
    let response = get_auth(test.app(), "/users/me", access).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_token_kinds_are_not_interchangeable(pool: PgPool) {
    create_verified_user(&pool, "kinds@example.com").await;
    let test = build_test_app(pool);
    let tokens = login(test.app(), "kinds@example.com", TEST_PASSWORD).await;
    let access = tokens["access_token"].as_str().unwrap();
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = post_auth(test.app(), "/token/refresh/", access).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid refresh token");

    let response = get_auth(test.app(), "/users/me", refresh).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_with_garbage_token(pool: PgPool) {
    let test = build_test_app(pool);

    let response = post_auth(test.app(), "/token/refresh/", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
