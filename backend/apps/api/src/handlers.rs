//! HTTP Handlers
//!
//! Login, logout, session administration and the demo `/pet` resources.
//! Every route sits behind the authorization middleware; the catalog
//! decides which ones need a session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use platform::client::client_host;
use platform::cookie::{CookieConfig, delete_cookie_header, set_cookie_header};
use platform::password::{Argon2PasswordEncoder, PasswordEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use warden::domain::cache::Cache;
use warden::domain::entity::{Catalog, Session, SubjectDetails};
use warden::domain::repository::SessionRepository;
use warden::infra::{MemoryCache, StaticMetadataProvider};
use warden::middleware::{CurrentSession, WardenMiddlewareState, require_authorization};
use warden::presentation::HttpRequest;
use warden::{AuthorizationManager, RetryLimiter, WardenError, WardenResult};

use crate::demo::Directory;

pub type Engine<S> = AuthorizationManager<S, StaticMetadataProvider, MemoryCache<Catalog>>;

/// Shared state for the handlers
pub struct AppState<S, R> {
    pub authorization: Arc<Engine<S>>,
    pub limiter: Arc<RetryLimiter<R>>,
    pub directory: Arc<Directory>,
    pub encoder: Arc<Argon2PasswordEncoder>,
    /// Set when tokens travel in a cookie
    pub cookie: Option<CookieConfig>,
}

impl<S, R> Clone for AppState<S, R> {
    fn clone(&self) -> Self {
        Self {
            authorization: Arc::clone(&self.authorization),
            limiter: Arc::clone(&self.limiter),
            directory: Arc::clone(&self.directory),
            encoder: Arc::clone(&self.encoder),
            cookie: self.cookie.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub principal: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: String,
    pub principal: String,
    pub timeout: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Build the router for a session store `S` and retry counter cache `R`
pub fn router<S, R>(state: AppState<S, R>) -> Router
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let guard = WardenMiddlewareState::new(Arc::clone(&state.authorization));

    Router::new()
        .route("/login", post(login::<S, R>))
        .route("/logout", post(logout::<S, R>))
        .route("/current", get(current))
        .route("/online", get(online::<S, R>))
        .route("/kickout/session/{id}", post(kick_out_session::<S, R>))
        .route("/kickout/principal/{principal}", post(kick_out_principal::<S, R>))
        .route("/pet/cat", get(cats))
        .route("/pet/cat/{id}", get(cat))
        .route("/pet/dog", get(dogs))
        .layer(axum::middleware::from_fn(
            move |req: Request<Body>, next: Next| require_authorization(guard.clone(), req, next),
        ))
        .with_state(state)
}

// ============================================================================
// Login / Logout
// ============================================================================

/// POST /login
pub async fn login<S, R>(
    State(state): State<AppState<S, R>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> WardenResult<Response>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let principal = req.principal.trim();
    state.limiter.check(principal).await?;

    let verified = state
        .directory
        .find(principal)
        .filter(|user| state.encoder.matches(&req.password, &user.password_hash));
    let Some(user) = verified else {
        state.limiter.increase(principal).await?;
        let left = state.limiter.left_count(principal).await?;
        tracing::info!(principal = %principal, left, "Login failed");
        return Err(WardenError::Account(format!(
            "Invalid principal or password, {left} attempt(s) left"
        )));
    };
    state.limiter.remove(principal).await?;

    let details = SubjectDetails::new(principal)
        .with_roles(user.roles.iter().cloned())
        .with_attribute("name", json!(user.name));
    let host = client_host(&headers, Some(addr.ip()));
    let session = state
        .authorization
        .authentication()
        .login(details, host)
        .await?;

    let body = Json(LoginResponse {
        session_id: session.id.clone(),
        principal: session.principal().to_string(),
        timeout: session.timeout,
    });
    Ok(match &state.cookie {
        Some(cookie) => (
            [(header::SET_COOKIE, set_cookie_header(cookie, &session.id))],
            body,
        )
            .into_response(),
        None => body.into_response(),
    })
}

/// POST /logout
pub async fn logout<S, R>(
    State(state): State<AppState<S, R>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> WardenResult<Response>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let view = HttpRequest::new(&method, &uri, &headers);
    state.authorization.authentication().logout(&view).await?;

    Ok(match &state.cookie {
        Some(cookie) => (
            StatusCode::NO_CONTENT,
            [(header::SET_COOKIE, delete_cookie_header(cookie))],
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /current
pub async fn current(CurrentSession(session): CurrentSession) -> Json<Session> {
    Json(session)
}

// ============================================================================
// Administration
// ============================================================================

/// GET /online?page=&size=
///
/// Paged when the store supports it and `page` is given, the full list
/// otherwise.
pub async fn online<S, R>(
    State(state): State<AppState<S, R>>,
    Query(query): Query<PageQuery>,
) -> WardenResult<Response>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let auth = state.authorization.authentication();
    if let Some(page_no) = query.page {
        let size = query.size.unwrap_or(10);
        if let Some(page) = auth.active_sessions_page(page_no, size).await? {
            return Ok(Json(page).into_response());
        }
    }
    Ok(Json(auth.active_sessions().await?).into_response())
}

/// POST /kickout/session/{id}
pub async fn kick_out_session<S, R>(
    State(state): State<AppState<S, R>>,
    Path(id): Path<String>,
) -> WardenResult<Json<Session>>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let session = state
        .authorization
        .authentication()
        .kick_out_session(&id)
        .await?;
    Ok(Json(session))
}

/// POST /kickout/principal/{principal}
pub async fn kick_out_principal<S, R>(
    State(state): State<AppState<S, R>>,
    Path(principal): Path<String>,
) -> WardenResult<Json<Session>>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    let session = state
        .authorization
        .authentication()
        .kick_out_principal(&principal)
        .await?;
    Ok(Json(session))
}

// ============================================================================
// Demo resources
// ============================================================================

pub async fn cats(CurrentSession(session): CurrentSession) -> Json<serde_json::Value> {
    Json(json!({ "cats": ["tom", "kitty"], "viewer": session.principal() }))
}

pub async fn cat(
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    Json(json!({ "cat": id, "viewer": session.principal() }))
}

pub async fn dogs(CurrentSession(session): CurrentSession) -> Json<serde_json::Value> {
    Json(json!({ "dogs": ["spike"], "viewer": session.principal() }))
}
