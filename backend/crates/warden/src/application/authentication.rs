//! Authentication Coordinator
//!
//! Login, logout, current-session resolution and administrative kick-out.
//! This is the only place the one-session-per-principal rule is decided.

use std::sync::Arc;

use crate::application::config::WardenConfig;
use crate::domain::entity::{Page, Session, SubjectDetails};
use crate::domain::event::{AuthenticationEvents, AuthenticationListener, LoginOutcome};
use crate::domain::repository::SessionRepository;
use crate::domain::request::InboundRequest;
use crate::error::{WardenError, WardenResult};

/// Message for a login rejected because the principal is already signed in
pub const DUPLICATE_LOGIN: &str =
    "Already signed in elsewhere. Login rejected until the previous session ends";

pub struct AuthenticationManager<S> {
    sessions: Arc<S>,
    config: Arc<WardenConfig>,
    events: AuthenticationEvents,
}

impl<S> Clone for AuthenticationManager<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            config: Arc::clone(&self.config),
            events: self.events.clone(),
        }
    }
}

impl<S> AuthenticationManager<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(sessions: Arc<S>, config: Arc<WardenConfig>) -> Self {
        Self {
            sessions,
            config,
            events: AuthenticationEvents::default(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn AuthenticationListener>) -> Self {
        self.events.register(listener);
        self
    }

    pub fn sessions(&self) -> &Arc<S> {
        &self.sessions
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Sign a subject in
    ///
    /// A live session already held by the principal is either kept (and the
    /// new login rejected, with concurrent login on) or kicked out. A stale
    /// one is removed silently.
    pub async fn login(&self, details: SubjectDetails, host: Option<String>) -> WardenResult<Session> {
        if !details.has_principal() {
            return Err(WardenError::Account(
                "principal must not be blank, login failed".to_string(),
            ));
        }

        if let Some(existing) = self.sessions.get_by_principal(&details.principal).await? {
            if existing.is_timed_out() {
                tracing::debug!(session_id = %existing.id, "Removing stale session before login");
                self.sessions.delete(&existing).await?;
            } else if self.config.session.concurrent_login {
                self.events.login(LoginOutcome::RejectedDuplicate, &existing);
                tracing::info!(principal = %existing.principal(), "Duplicate login rejected");
                return Err(WardenError::Account(DUPLICATE_LOGIN.to_string()));
            } else {
                tracing::warn!(
                    principal = %existing.principal(),
                    session_id = %existing.id,
                    "Signed in elsewhere, previous session kicked out"
                );
                self.events.login(LoginOutcome::KickedPrevious, &existing);
                self.sessions.delete(&existing).await?;
            }
        }

        let session = self.sessions.create(details, host).await?;
        self.events.login(LoginOutcome::CreatedNew, &session);
        tracing::info!(
            principal = %session.principal(),
            session_id = %session.id,
            "Signed in"
        );
        Ok(session)
    }

    /// Session token carried by the request: cookie (when enabled), then
    /// header, then query parameter. Blank values are skipped.
    pub fn resolve_token<R>(&self, request: &R) -> Option<String>
    where
        R: InboundRequest + ?Sized,
    {
        let name = &self.config.session.session_name;
        let cookie = if self.config.cookie.enabled {
            request.cookie(&self.config.cookie.name)
        } else {
            None
        };

        cookie
            .filter(|token| !token.trim().is_empty())
            .or_else(|| request.header(name).filter(|t| !t.trim().is_empty()))
            .or_else(|| request.query_param(name).filter(|t| !t.trim().is_empty()))
    }

    /// Session for the request, renewed on success
    ///
    /// With `throw` off, every failure short of a backend error is `Ok(None)`.
    pub async fn current_session<R>(&self, request: &R, throw: bool) -> WardenResult<Option<Session>>
    where
        R: InboundRequest + ?Sized,
    {
        let session = match self.resolve_token(request) {
            Some(token) => self.sessions.read(&token).await?,
            None => None,
        };
        self.checked(session, throw).await
    }

    /// Session held by `principal`, renewed on success
    pub async fn session_by_principal(&self, principal: &str) -> WardenResult<Session> {
        if principal.trim().is_empty() {
            return Err(WardenError::Account("principal must not be blank".to_string()));
        }
        let session = self.sessions.get_by_principal(principal).await?;
        self.checked(session, true)
            .await?
            .ok_or_else(WardenError::unauthenticated)
    }

    async fn checked(&self, session: Option<Session>, throw: bool) -> WardenResult<Option<Session>> {
        match session {
            None if throw => Err(WardenError::unauthenticated()),
            None => Ok(None),
            Some(session) if session.is_timed_out() => {
                tracing::debug!(session_id = %session.id, "Session has expired");
                if throw {
                    Err(WardenError::SessionExpired)
                } else {
                    Ok(None)
                }
            }
            Some(session) => Ok(Some(self.sessions.update(session).await?)),
        }
    }

    /// Sign the current request's session out, returning it
    pub async fn logout<R>(&self, request: &R) -> WardenResult<Session>
    where
        R: InboundRequest + ?Sized,
    {
        let session = self
            .current_session(request, true)
            .await?
            .ok_or_else(WardenError::unauthenticated)?;
        self.sessions.delete(&session).await?;
        self.events.logout(&session);
        tracing::info!(
            principal = %session.principal(),
            session_id = %session.id,
            "Signed out"
        );
        Ok(session)
    }

    pub async fn kick_out_session(&self, session_id: &str) -> WardenResult<Session> {
        if session_id.trim().is_empty() {
            return Err(WardenError::Account("session id must not be blank".to_string()));
        }
        let session = self
            .sessions
            .read(session_id)
            .await?
            .ok_or_else(|| WardenError::InvalidSession(session_id.to_string()))?;
        self.sessions.delete(&session).await?;
        self.events.session_kicked_out(&session);
        tracing::info!(
            principal = %session.principal(),
            session_id = %session.id,
            "Session kicked out"
        );
        Ok(session)
    }

    pub async fn kick_out_principal(&self, principal: &str) -> WardenResult<Session> {
        let session = self.session_by_principal(principal).await?;
        self.sessions.delete(&session).await?;
        self.events.principal_kicked_out(&session);
        tracing::info!(
            principal = %session.principal(),
            session_id = %session.id,
            "Principal kicked out"
        );
        Ok(session)
    }

    pub async fn active_sessions(&self) -> WardenResult<Vec<Session>> {
        self.sessions.active_sessions().await
    }

    /// `None` when the store cannot page
    pub async fn active_sessions_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> WardenResult<Option<Page<Session>>> {
        self.sessions.active_sessions_page(page_no, page_size).await
    }
}
