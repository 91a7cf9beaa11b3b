// src/app.rs

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::auth::rate_limit::RateLimiter;
use crate::auth::services::SessionService;
use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SessionService>,
    /// Throttles credential attempts (login, register), keyed ip + email.
    pub limiter: Arc<dyn RateLimiter>,
    /// Looser policy for refresh, keyed by ip alone.
    pub refresh_limiter: Arc<dyn RateLimiter>,
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/logout-all", post(handlers::auth::logout_all))
        .route("/me", get(handlers::auth::me))
        .route("/profile", put(handlers::auth::update_profile))
        .route("/change-password", put(handlers::auth::change_password))
        .route("/sessions", get(handlers::sessions::list_sessions))
        .route("/sessions/{id}", delete(handlers::sessions::revoke_session))
}

fn admin_routes() -> Router<AppState> {
    Router::new().route("/sessions/cleanup", post(handlers::sessions::cleanup_sessions))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::auth::jwt::TokenCodec;
    use crate::auth::rate_limit::SlidingWindowLimiter;
    use crate::db::models::user::{NewUser, Role};
    use crate::store::UserStore;
    use crate::store::memory::{MemorySessionStore, MemoryUserStore};

    fn make_state_with(
        codec: TokenCodec,
        limiter: Arc<dyn RateLimiter>,
        refresh_limiter: Arc<dyn RateLimiter>,
    ) -> (AppState, Arc<MemoryUserStore>) {
        let users = Arc::new(MemoryUserStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let service = SessionService::new(codec, users.clone(), sessions, 7);
        let state = AppState {
            service: Arc::new(service),
            limiter,
            refresh_limiter,
        };
        (state, users)
    }

    fn make_state(codec: TokenCodec, limiter: Arc<dyn RateLimiter>) -> (AppState, Arc<MemoryUserStore>) {
        make_state_with(codec, limiter.clone(), limiter)
    }

    fn default_codec() -> TokenCodec {
        TokenCodec::new("access_secret_for_tests", "refresh_secret_for_tests", 15, 7)
    }

    fn permissive_limiter() -> Arc<dyn RateLimiter> {
        Arc::new(SlidingWindowLimiter::new(1000, Duration::from_secs(60)))
    }

    fn seed(users: &MemoryUserStore, email: &str, password: &str, role: Role) {
        users
            .create(&NewUser {
                email: email.to_string(),
                name: "Test User".to_string(),
                password_hash: bcrypt::hash(password, 4).expect("hash"),
                role,
            })
            .expect("seed user");
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn login_pair(router: &Router, email: &str, password: &str) -> (String, String) {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                json!({"email": email, "password": password}),
            ))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        (
            body["access_token"].as_str().expect("access").to_string(),
            body["refresh_token"].as_str().expect("refresh").to_string(),
        )
    }

    #[tokio::test]
    async fn register_refresh_logout_full_flow() {
        let (state, _) = make_state(default_codec(), permissive_limiter());
        let router = build_router(state);

        // Register issues a working pair with 201
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/register",
                json!({"name": "Alice", "email": "alice@example.com", "password": "Password123"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"].get("password_hash").is_none());
        let access = body["access_token"].as_str().unwrap().to_string();
        let r0 = body["refresh_token"].as_str().unwrap().to_string();

        // The access token opens /auth/me
        let response = router
            .clone()
            .oneshot(authed_request("GET", "/auth/me", &access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Refresh rotates the pair
        let response = router
            .clone()
            .oneshot(json_request("POST", "/auth/refresh", json!({"refresh_token": r0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let r1 = body["refresh_token"].as_str().unwrap().to_string();
        assert_ne!(r1, r0);

        // The consumed token is dead
        let response = router
            .clone()
            .oneshot(json_request("POST", "/auth/refresh", json!({"refresh_token": r0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "INVALID_REFRESH_TOKEN");

        // Logout (behind the guard) succeeds and kills the session
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"refresh_token": r1}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(json_request("POST", "/auth/refresh", json!({"refresh_token": r1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_tolerates_an_empty_body() {
        let (state, users) = make_state(default_codec(), permissive_limiter());
        seed(&users, "alice@example.com", "Password123", Role::User);
        let router = build_router(state);
        let (access, _) = login_pair(&router, "alice@example.com", "Password123").await;

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn logout_without_token_is_401() {
        let (state, _) = make_state(default_codec(), permissive_limiter());
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"refresh_token": "anything"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn protected_route_without_token_is_401() {
        let (state, _) = make_state(default_codec(), permissive_limiter());
        let router = build_router(state);

        let response = router
            .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn expired_access_token_reports_machine_readable_code() {
        // Negative TTL mints already-expired access tokens
        let codec = TokenCodec::new("access_secret_for_tests", "refresh_secret_for_tests", -60, 7);
        let (state, users) = make_state(codec, permissive_limiter());
        seed(&users, "alice@example.com", "Password123", Role::User);
        let router = build_router(state);

        let (access, _) = login_pair(&router, "alice@example.com", "Password123").await;

        let response = router
            .oneshot(authed_request("GET", "/auth/me", &access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // Distinct from INVALID_TOKEN: the client should silently refresh
        assert_eq!(body_json(response).await["error"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn cleanup_requires_the_admin_role() {
        let (state, users) = make_state(default_codec(), permissive_limiter());
        seed(&users, "user@example.com", "Password123", Role::User);
        seed(&users, "admin@example.com", "Password123", Role::Admin);
        let router = build_router(state);

        let (user_access, _) = login_pair(&router, "user@example.com", "Password123").await;
        let response = router
            .clone()
            .oneshot(authed_request("POST", "/admin/sessions/cleanup", &user_access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let (admin_access, _) = login_pair(&router, "admin@example.com", "Password123").await;
        let response = router
            .oneshot(authed_request("POST", "/admin/sessions/cleanup", &admin_access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn sixth_login_attempt_within_the_window_is_throttled() {
        let limiter: Arc<dyn RateLimiter> =
            Arc::new(SlidingWindowLimiter::new(5, Duration::from_secs(900)));
        let (state, _) = make_state(default_codec(), limiter);
        let router = build_router(state);

        let attempt = || {
            json_request(
                "POST",
                "/auth/login",
                json!({"email": "victim@example.com", "password": "WrongPass1"}),
            )
        };

        for _ in 0..5 {
            let response = router.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = router.oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "TOO_MANY_ATTEMPTS");
        assert!(body["retry_after"].as_u64().is_some());
    }

    #[tokio::test]
    async fn throttle_buckets_are_per_email() {
        let limiter: Arc<dyn RateLimiter> =
            Arc::new(SlidingWindowLimiter::new(1, Duration::from_secs(900)));
        let (state, users) = make_state(default_codec(), limiter);
        seed(&users, "alice@example.com", "Password123", Role::User);
        let state_router = build_router(state);

        // Exhaust the bucket for one email
        let response = state_router
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                json!({"email": "victim@example.com", "password": "WrongPass1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A different email from the same address still gets through
        let response = state_router
            .oneshot(json_request(
                "POST",
                "/auth/login",
                json!({"email": "alice@example.com", "password": "Password123"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_is_throttled_by_its_own_policy() {
        // Credential bucket is already exhausted after one hit; refresh allows two
        let credential: Arc<dyn RateLimiter> =
            Arc::new(SlidingWindowLimiter::new(1, Duration::from_secs(900)));
        let refresh: Arc<dyn RateLimiter> =
            Arc::new(SlidingWindowLimiter::new(2, Duration::from_secs(900)));
        let (state, _) = make_state_with(default_codec(), credential, refresh);
        let router = build_router(state);

        let attempt = || json_request("POST", "/auth/refresh", json!({"refresh_token": "junk"}));

        for _ in 0..2 {
            let response = router.clone().oneshot(attempt()).await.unwrap();
            // Past the limiter; the garbage token itself is what gets rejected
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = router.oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn health_reports_authentication_state() {
        let (state, users) = make_state(default_codec(), permissive_limiter());
        seed(&users, "alice@example.com", "Password123", Role::User);
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["authenticated"], false);

        let (access, _) = login_pair(&router, "alice@example.com", "Password123").await;
        let response = router
            .oneshot(authed_request("GET", "/health", &access))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["authenticated"], true);
    }

    #[tokio::test]
    async fn sessions_listing_and_individual_revocation() {
        let (state, users) = make_state(default_codec(), permissive_limiter());
        seed(&users, "alice@example.com", "Password123", Role::User);
        let router = build_router(state);

        let (access, _) = login_pair(&router, "alice@example.com", "Password123").await;
        let (_, _) = login_pair(&router, "alice@example.com", "Password123").await;

        let response = router
            .clone()
            .oneshot(authed_request("GET", "/auth/sessions", &access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);

        let target = sessions[0]["id"].as_str().unwrap();
        let response = router
            .clone()
            .oneshot(authed_request(
                "DELETE",
                &format!("/auth/sessions/{target}"),
                &access,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(authed_request("GET", "/auth/sessions", &access))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    }
}
