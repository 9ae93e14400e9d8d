//! Warden Middleware
//!
//! Axum middleware guarding routes with the authorization engine, and an
//! extractor for the session it resolved.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::Request;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::authorization::AuthorizationManager;
use crate::domain::cache::Cache;
use crate::domain::entity::{Catalog, Session};
use crate::domain::repository::{AuthorizationMetadataProvider, SessionRepository};
use crate::error::WardenError;
use crate::presentation::request::HttpRequest;

/// Middleware state
pub struct WardenMiddlewareState<S, P, C> {
    pub authorization: Arc<AuthorizationManager<S, P, C>>,
}

impl<S, P, C> Clone for WardenMiddlewareState<S, P, C> {
    fn clone(&self) -> Self {
        Self {
            authorization: Arc::clone(&self.authorization),
        }
    }
}

impl<S, P, C> WardenMiddlewareState<S, P, C> {
    pub fn new(authorization: Arc<AuthorizationManager<S, P, C>>) -> Self {
        Self { authorization }
    }
}

/// Session resolved for the request, stored in request extensions
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Middleware that enforces the rule catalog
///
/// Requests to protected paths need a session holding a matching
/// authority. When a session is present it is inserted as
/// [`CurrentSession`] for downstream handlers.
pub async fn require_authorization<S, P, C>(
    state: WardenMiddlewareState<S, P, C>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    S: SessionRepository + Send + Sync + 'static,
    P: AuthorizationMetadataProvider + Send + Sync + 'static,
    C: Cache<Catalog> + Send + Sync + 'static,
{
    let session = {
        let view = HttpRequest::from_request(&req);
        state
            .authorization
            .authorize(&view)
            .await
            .map_err(IntoResponse::into_response)?;
        state
            .authorization
            .authentication()
            .current_session(&view, false)
            .await
            .map_err(IntoResponse::into_response)?
    };

    if let Some(session) = session {
        req.extensions_mut().insert(CurrentSession(session));
    }

    Ok(next.run(req).await)
}

/// Middleware that requires a live session regardless of the catalog
pub async fn require_session<S, P, C>(
    state: WardenMiddlewareState<S, P, C>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    S: SessionRepository + Send + Sync + 'static,
    P: AuthorizationMetadataProvider + Send + Sync + 'static,
    C: Cache<Catalog> + Send + Sync + 'static,
{
    let session = {
        let view = HttpRequest::from_request(&req);
        state
            .authorization
            .authentication()
            .current_session(&view, true)
            .await
            .map_err(IntoResponse::into_response)?
            .ok_or_else(|| WardenError::unauthenticated().into_response())?
    };

    req.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(req).await)
}

impl<St> FromRequestParts<St> for CurrentSession
where
    St: Send + Sync,
{
    type Rejection = WardenError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(WardenError::unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::authentication::AuthenticationManager;
    use crate::application::config::WardenConfig;
    use crate::domain::entity::SubjectDetails;
    use crate::infra::local_session::InProcessSessionStore;
    use crate::infra::memory::MemoryCache;
    use crate::infra::metadata::StaticMetadataProvider;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    type State =
        WardenMiddlewareState<InProcessSessionStore, StaticMetadataProvider, MemoryCache<Catalog>>;

    fn state() -> State {
        let config = Arc::new(WardenConfig::default());
        let store = Arc::new(InProcessSessionStore::new(Arc::clone(&config)));
        let authentication = AuthenticationManager::new(store, Arc::clone(&config));
        let provider = StaticMetadataProvider::new(Catalog::new().with_rule("/pet/**", ["admin"]));
        let authorization = AuthorizationManager::new(
            authentication,
            Arc::new(provider),
            MemoryCache::default(),
            config,
        );
        WardenMiddlewareState::new(Arc::new(authorization))
    }

    fn app(state: State) -> Router {
        Router::new()
            .route(
                "/pet/cat",
                get(|CurrentSession(s): CurrentSession| async move { s.details.principal }),
            )
            .route("/open", get(|| async { "open" }))
            .layer(axum::middleware::from_fn(move |req: Request<Body>, next: Next| {
                require_authorization(state.clone(), req, next)
            }))
    }

    fn get_with_token(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header("WSessionId", token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_guarded_routes() {
        let state = state();
        let auth = state.authorization.authentication().clone();
        let admin = auth
            .login(SubjectDetails::new("PC:1").with_roles(["admin"]), None)
            .await
            .unwrap();
        let user = auth
            .login(SubjectDetails::new("PC:2").with_roles(["user"]), None)
            .await
            .unwrap();
        let app = app(state);

        let res = app.clone().oneshot(get_with_token("/open", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(get_with_token("/pet/cat", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(get_with_token("/pet/cat", Some(&user.id)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(get_with_token("/pet/cat", Some(&admin.id)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
