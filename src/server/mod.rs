//! HTTP surface: verification-link resend, token verification and a health probe.

mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::Method,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::email::Mailer;
use crate::store::KeyValueStore;
use crate::users::UserStore;
use crate::verification::VerificationCodeIssuer;

pub use error::ServerError;

pub struct AppState<S, M> {
    pub users: UserStore<S>,
    pub issuer: Arc<VerificationCodeIssuer<M>>,
}

impl<S: Clone, M> Clone for AppState<S, M> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            issuer: Arc::clone(&self.issuer),
        }
    }
}

impl<S, M> AppState<S, M> {
    pub fn new(users: UserStore<S>, issuer: VerificationCodeIssuer<M>) -> Self {
        Self {
            users,
            issuer: Arc::new(issuer),
        }
    }
}

pub fn build_router<S, M>(state: AppState<S, M>) -> Router
where
    S: KeyValueStore + Clone + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/auth/resend-verification",
            post(resend_verification::<S, M>),
        )
        .route("/api/auth/verify", get(verify_email::<S, M>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Deserialize)]
struct ResendRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct VerifyQuery {
    #[serde(default)]
    token: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn resend_verification<S, M>(
    State(state): State<AppState<S, M>>,
    Json(request): Json<ResendRequest>,
) -> Result<Json<MessageResponse>, ServerError>
where
    S: KeyValueStore + Clone + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(ServerError::BadRequest("Email is required".to_string()));
    }

    let mut user = state
        .users
        .find_by_email(email)?
        .ok_or_else(|| ServerError::NotFound("User not found".to_string()))?;
    if user.verified {
        return Err(ServerError::BadRequest("User is already verified".to_string()));
    }

    let token = state.issuer.issue_link(&user.email, &user.name).await?;
    user.verification_token = Some(token);
    state.users.upsert(&user)?;

    info!(email = %user.email, "verification email resent");
    Ok(Json(MessageResponse {
        message: "Verification email sent",
    }))
}

async fn verify_email<S, M>(
    State(state): State<AppState<S, M>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<MessageResponse>, ServerError>
where
    S: KeyValueStore + Clone + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let token = query.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(ServerError::BadRequest("Token is required".to_string()));
    }

    let mut user = state
        .users
        .find_by_verification_token(token)?
        .ok_or_else(|| ServerError::NotFound("Invalid or expired token".to_string()))?;

    user.verified = true;
    user.verification_token = None;
    user.verification_code = None;
    user.code_issued_at = None;
    state.users.upsert(&user)?;

    if let Some(session) = state.users.get_session()? {
        if session.email == user.email {
            state.users.set_session(&user.to_session())?;
        }
    }

    info!(email = %user.email, "email verified by link");
    Ok(Json(MessageResponse {
        message: "Email verified",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::email::MailError;
    use crate::email::fake::RecordingMailer;
    use crate::models::UserRecord;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn setup(mailer: RecordingMailer) -> (Router, UserStore<MemoryStore>) {
        let users = UserStore::new(MemoryStore::new());
        let issuer = VerificationCodeIssuer::new(mailer, &EmailConfig::default());
        let router = build_router(AppState::new(users.clone(), issuer));
        (router, users)
    }

    fn seed(users: &UserStore<MemoryStore>, email: &str, verified: bool) -> UserRecord {
        let mut user = UserRecord::new("Alice".into(), email.into());
        user.verified = verified;
        users.upsert(&user).unwrap();
        user
    }

    fn resend_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/auth/resend-verification")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = setup(RecordingMailer::default());
        let (status, body) = call(router, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_resend_requires_email() {
        let (router, _) = setup(RecordingMailer::default());

        let (status, body) = call(router.clone(), resend_request(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email is required");

        let (status, _) = call(router, resend_request(json!({"email": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resend_unknown_user() {
        let (router, _) = setup(RecordingMailer::default());
        let (status, body) =
            call(router, resend_request(json!({"email": "ghost@example.com"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn test_resend_already_verified() {
        let mailer = RecordingMailer::default();
        let (router, users) = setup(mailer.clone());
        seed(&users, "alice@example.com", true);

        let (status, body) =
            call(router, resend_request(json!({"email": "alice@example.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User is already verified");
        assert_eq!(mailer.count(), 0);
    }

    #[tokio::test]
    async fn test_resend_stores_token_and_sends_link() {
        let mailer = RecordingMailer::default();
        let (router, users) = setup(mailer.clone());
        seed(&users, "alice@example.com", false);

        let (status, body) =
            call(router, resend_request(json!({"email": "alice@example.com"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Verification email sent");

        let stored = users.find_by_email("alice@example.com").unwrap().unwrap();
        let token = stored.verification_token.unwrap();
        assert!(mailer.last().unwrap().verify_link.ends_with(&token));
    }

    #[tokio::test]
    async fn test_resend_delivery_failure_is_internal_error() {
        let (router, users) = setup(RecordingMailer::failing(|| MailError::Rejected(500)));
        seed(&users, "alice@example.com", false);

        let (status, body) =
            call(router, resend_request(json!({"email": "alice@example.com"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Error");
        let stored = users.find_by_email("alice@example.com").unwrap().unwrap();
        assert!(stored.verification_token.is_none());
    }

    #[tokio::test]
    async fn test_verify_token_flow() {
        let mailer = RecordingMailer::default();
        let (router, users) = setup(mailer.clone());
        let alice = seed(&users, "alice@example.com", false);
        users.set_session(&alice.to_session()).unwrap();

        let (status, _) = call(router.clone(), get_request("/api/auth/verify")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(router.clone(), get_request("/api/auth/verify?token=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(
            router.clone(),
            resend_request(json!({"email": "alice@example.com"})),
        )
        .await;
        let token = users
            .find_by_email("alice@example.com")
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        let uri = format!("/api/auth/verify?token={}", token);
        let (status, body) = call(router.clone(), get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Email verified");

        let stored = users.find_by_email("alice@example.com").unwrap().unwrap();
        assert!(stored.verified);
        assert!(stored.verification_token.is_none());
        assert!(users.get_session().unwrap().unwrap().verified);

        // Tokens are single use.
        let (status, _) = call(router, get_request(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
