#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the request gate.
//!
//! These drive the real router through `tower::ServiceExt::oneshot`:
//! real middleware, real JWT verification, no mocks except where a test
//! needs the verifier to fail.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use gruzzolo_kernel::app;
use gruzzolo_kernel::middleware::GateConfig;
use gruzzolo_kernel::session::{JwtSessionVerifier, SessionClaims, SessionIdentity, SessionVerifier};
use gruzzolo_kernel::state::AppState;

const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

fn test_app() -> Router {
    let state = AppState::with_parts(
        GateConfig::standard(),
        Arc::new(JwtSessionVerifier::new(SECRET)),
    );
    app(state)
}

/// Mint a session JWT for `user` the way the auth collaborator would.
fn mint_token(user: Uuid) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user.to_string(),
        iat: now,
        exp: now + 3600,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_session(uri: &str, user: Uuid) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("session-token={}", mint_token(user)))
        .body(Body::empty())
        .unwrap()
}

fn location(response: &Response<axum::body::Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("expected a Location header")
        .to_str()
        .unwrap()
}

async fn json_body(response: Response<axum::body::Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Bypass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn favicon_is_passed_through_untouched() {
    // No route serves it, but the gate must not redirect it either
    let response = test_app().oneshot(get("/favicon.ico")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn favicon_bypass_ignores_headers_and_session() {
    let request = Request::builder()
        .uri("/favicon.ico")
        .header(header::ACCEPT_LANGUAGE, "es-ES")
        .header(header::COOKIE, format!("session-token={}", mint_token(Uuid::now_v7())))
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn health_answers_without_locale_prefix() {
    let response = test_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

// ---------------------------------------------------------------------------
// Canonical locale redirects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prefixless_path_redirects_to_default_locale() {
    let response = test_app().oneshot(get("/products")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/en-US/products");
}

#[tokio::test]
async fn prefixless_path_negotiates_accept_language() {
    let request = Request::builder()
        .uri("/terms")
        .header(header::ACCEPT_LANGUAGE, "pt-BR,en;q=0.5")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/pt-BR/terms");
}

#[tokio::test]
async fn lang_query_override_beats_accept_language() {
    let request = Request::builder()
        .uri("/products?lang=pt")
        .header(header::ACCEPT_LANGUAGE, "es-ES")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    // The rewrite preserves the query string as received
    assert_eq!(location(&response), "/pt-BR/products?lang=pt");
}

#[tokio::test]
async fn x_locale_header_override_is_honored() {
    let request = Request::builder()
        .uri("/products")
        .header("x-locale", "es")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(location(&response), "/es-ES/products");
}

#[tokio::test]
async fn root_redirects_and_landing_serves() {
    let app = test_app();

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/en-US/");

    let response = app.oneshot(get("/en-US/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"], "landing");
    assert_eq!(body["locale"], "en-US");
}

// ---------------------------------------------------------------------------
// Protected routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anonymous_dashboard_request_redirects_to_localized_signin() {
    let request = Request::builder()
        .uri("/dashboard")
        .header(header::ACCEPT_LANGUAGE, "es-ES,en;q=0.5")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/es-ES/auth/signin?callbackUrl=/dashboard"
    );
}

#[tokio::test]
async fn signin_redirect_callback_includes_prefix_and_query() {
    let response = test_app()
        .oneshot(get("/en-US/dashboard?tab=goals"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/en-US/auth/signin?callbackUrl=/en-US/dashboard?tab=goals"
    );
}

#[tokio::test]
async fn authenticated_dashboard_request_passes_through() {
    let user = Uuid::now_v7();
    let response = test_app()
        .oneshot(get_with_session("/en-US/dashboard", user))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"], "dashboard");
    assert_eq!(body["locale"], "en-US");
    assert_eq!(body["subject"], user.to_string());
}

#[tokio::test]
async fn canonical_authenticated_request_is_idempotent() {
    // Correct prefix + valid session: pass-through every time, no loop
    let app = test_app();
    let user = Uuid::now_v7();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get_with_session("/en-US/dashboard", user))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::LOCATION).is_none());
    }
}

#[tokio::test]
async fn expired_session_is_treated_as_anonymous() {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: Uuid::now_v7().to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    let request = Request::builder()
        .uri("/en-US/dashboard")
        .header(header::COOKIE, format!("session-token={token}"))
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/en-US/auth/signin?callbackUrl=/en-US/dashboard"
    );
}

// ---------------------------------------------------------------------------
// Auth-only routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signed_in_user_is_bounced_from_signin_to_dashboard() {
    let response = test_app()
        .oneshot(get_with_session("/en-US/auth/signin", Uuid::now_v7()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/en-US/dashboard");
}

#[tokio::test]
async fn anonymous_user_reaches_signin_page() {
    let response = test_app()
        .oneshot(get("/pt-BR/auth/signin?callbackUrl=/pt-BR/dashboard"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"], "signin");
    assert_eq!(body["locale"], "pt-BR");
    assert_eq!(body["callback_url"], "/pt-BR/dashboard");
}

// ---------------------------------------------------------------------------
// Verifier failure
// ---------------------------------------------------------------------------

/// A verifier whose backend is down.
struct UnavailableVerifier;

#[async_trait]
impl SessionVerifier for UnavailableVerifier {
    async fn verify(&self, _token: &str) -> anyhow::Result<Option<SessionIdentity>> {
        Err(anyhow!("session backend unreachable"))
    }
}

#[tokio::test]
async fn verifier_failure_fails_closed() {
    let state = AppState::with_parts(GateConfig::standard(), Arc::new(UnavailableVerifier));
    let request = Request::builder()
        .uri("/en-US/dashboard")
        .header(header::COOKIE, "session-token=whatever")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    // Infrastructure failure must deny access, not grant it
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/en-US/auth/signin?callbackUrl=/en-US/dashboard"
    );
}

#[tokio::test]
async fn verifier_failure_does_not_affect_public_pages() {
    let state = AppState::with_parts(GateConfig::standard(), Arc::new(UnavailableVerifier));
    let request = Request::builder()
        .uri("/en-US/")
        .header(header::COOKIE, "session-token=whatever")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    // Public pages never consult the verifier
    assert_eq!(response.status(), StatusCode::OK);
}
