//! Authorization Engine
//!
//! Decides whether the current subject may reach a method+path. The catalog
//! lists protected path patterns; only the first pattern matching the path
//! is evaluated, and paths no pattern matches are open.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::authentication::AuthenticationManager;
use crate::application::config::WardenConfig;
use crate::domain::cache::Cache;
use crate::domain::entity::{Authority, Catalog, Session};
use crate::domain::repository::{AuthorizationMetadataProvider, SessionRepository};
use crate::domain::request::InboundRequest;
use crate::domain::service::path_matcher::PathMatcher;
use crate::error::{WardenError, WardenResult};

pub struct AuthorizationManager<S, P, C> {
    authentication: AuthenticationManager<S>,
    provider: Arc<P>,
    catalog_cache: C,
    matcher: Arc<PathMatcher>,
    config: Arc<WardenConfig>,
}

impl<S, P, C: Clone> Clone for AuthorizationManager<S, P, C> {
    fn clone(&self) -> Self {
        Self {
            authentication: self.authentication.clone(),
            provider: Arc::clone(&self.provider),
            catalog_cache: self.catalog_cache.clone(),
            matcher: Arc::clone(&self.matcher),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, P, C> AuthorizationManager<S, P, C>
where
    S: SessionRepository + Send + Sync + 'static,
    P: AuthorizationMetadataProvider + Send + Sync + 'static,
    C: Cache<Catalog> + Send + Sync + 'static,
{
    pub fn new(
        authentication: AuthenticationManager<S>,
        provider: Arc<P>,
        catalog_cache: C,
        config: Arc<WardenConfig>,
    ) -> Self {
        Self {
            authentication,
            provider,
            catalog_cache,
            matcher: Arc::new(PathMatcher::new()),
            config,
        }
    }

    /// Replace the default (case-sensitive) path matcher
    pub fn with_matcher(mut self, matcher: PathMatcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn authentication(&self) -> &AuthenticationManager<S> {
        &self.authentication
    }

    /// Throwing shorthand for [`Self::is_authorized`]
    pub async fn authorize<R>(&self, request: &R) -> WardenResult<()>
    where
        R: InboundRequest + ?Sized,
    {
        self.is_authorized(request, true).await.map(|_| ())
    }

    /// Whether the request may proceed
    ///
    /// A protected path without a session is always `Unauthenticated`;
    /// `throw_on_deny` only governs the authority decision.
    pub async fn is_authorized<R>(&self, request: &R, throw_on_deny: bool) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        let (method, path) = (request.method(), request.path());
        if method.trim().is_empty() || path.trim().is_empty() {
            return Ok(true);
        }

        let catalog = self.catalog().await?;
        if catalog.is_empty() {
            return Ok(true);
        }
        let Some((pattern, required)) = catalog.first_match(&self.matcher, path) else {
            tracing::trace!(method, path, "No rule matched, access open");
            return Ok(true);
        };
        tracing::debug!(method, path, pattern, "Rule matched, authorizing");

        let session = self
            .authentication
            .current_session(request, true)
            .await?
            .ok_or_else(WardenError::unauthenticated)?;
        let authorities = self.subject_authorities(&session).await?;

        if let Some(granted) = authorities
            .iter()
            .find(|authority| self.grants(authority, method, path, required))
        {
            tracing::debug!(
                method,
                path,
                principal = %session.principal(),
                authority = %granted,
                "Access granted"
            );
            return Ok(true);
        }

        tracing::warn!(
            method,
            path,
            principal = %session.principal(),
            required = ?required,
            "Access denied"
        );
        if throw_on_deny {
            Err(WardenError::Unauthorized(format!(
                "The current user is not permitted to access resource [{method}:{path}], Access denied."
            )))
        } else {
            Ok(false)
        }
    }

    fn grants(&self, authority: &Authority, method: &str, path: &str, required: &[String]) -> bool {
        match authority {
            Authority::MethodAndPath { path: granted, .. } => {
                authority.allows_method(method) && self.matcher.matches(granted, path)
            }
            Authority::Simple { authority } => required.iter().any(|r| r == authority),
        }
    }

    /// Authorities of the session's subject, read through the store cache
    /// when enabled. An empty list is not an error; it grants nothing.
    pub async fn subject_authorities(&self, session: &Session) -> WardenResult<Vec<Authority>> {
        if !self.config.authority.user_cached_enabled {
            return self.provider.load_subject_authorities(session).await;
        }

        let sessions = self.authentication.sessions();
        if let Some(cached) = sessions
            .subject_authorities(&session.id)
            .await?
            .filter(|authorities| !authorities.is_empty())
        {
            tracing::debug!(session_id = %session.id, "Subject authorities cache hit");
            return Ok(cached);
        }

        let loaded = self.provider.load_subject_authorities(session).await?;
        if loaded.is_empty() {
            tracing::warn!(principal = %session.principal(), "Subject has no authorities");
        } else {
            sessions
                .set_subject_authorities(&session.id, loaded.clone())
                .await?;
        }
        Ok(loaded)
    }

    /// Rule catalog, read through the catalog cache when enabled
    pub async fn catalog(&self) -> WardenResult<Catalog> {
        let authority = &self.config.authority;
        if !authority.sys_cached_enabled {
            return self.provider.load_catalog().await;
        }

        if let Some(cached) = self
            .catalog_cache
            .get(&authority.sys_cached_key)
            .await?
            .filter(|catalog| !catalog.is_empty())
        {
            return Ok(cached);
        }

        tracing::debug!("Catalog cache miss, loading from provider");
        let loaded = self.provider.load_catalog().await?;
        if !loaded.is_empty() {
            self.catalog_cache
                .put(&authority.sys_cached_key, loaded.clone())
                .await?;
        }
        Ok(loaded)
    }

    /// Reload the catalog from the provider and replace the cached copy.
    /// A provider failure leaves the cached copy untouched.
    pub async fn refresh_catalog(&self) -> WardenResult<Catalog> {
        let loaded = self.provider.load_catalog().await?;
        let key = &self.config.authority.sys_cached_key;
        if loaded.is_empty() {
            self.catalog_cache.remove(key).await?;
        } else {
            self.catalog_cache.put(key, loaded.clone()).await?;
        }
        tracing::info!(rules = loaded.len(), "Catalog refreshed");
        Ok(loaded)
    }

    pub async fn clear_catalog(&self) -> WardenResult<()> {
        self.catalog_cache
            .remove(&self.config.authority.sys_cached_key)
            .await?;
        Ok(())
    }

    /// Flat authority strings of the current subject: its authorities and
    /// its roles
    async fn granted_names<R>(&self, request: &R) -> WardenResult<HashSet<String>>
    where
        R: InboundRequest + ?Sized,
    {
        let session = self
            .authentication
            .current_session(request, true)
            .await?
            .ok_or_else(WardenError::unauthenticated)?;
        let mut names: HashSet<String> = self
            .subject_authorities(&session)
            .await?
            .iter()
            .map(Authority::authority)
            .collect();
        names.extend(session.details.roles.iter().cloned());
        Ok(names)
    }

    pub async fn has_role<R>(&self, request: &R, role: &str) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        Ok(self.granted_names(request).await?.contains(role))
    }

    pub async fn has_any_roles<R>(&self, request: &R, roles: &[&str]) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        let names = self.granted_names(request).await?;
        Ok(roles.iter().any(|role| names.contains(*role)))
    }

    pub async fn has_all_roles<R>(&self, request: &R, roles: &[&str]) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        let names = self.granted_names(request).await?;
        Ok(roles.iter().all(|role| names.contains(*role)))
    }

    pub async fn has_permission<R>(&self, request: &R, permission: &str) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        self.has_role(request, permission).await
    }

    pub async fn has_any_permissions<R>(&self, request: &R, permissions: &[&str]) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        self.has_any_roles(request, permissions).await
    }

    pub async fn has_all_permissions<R>(&self, request: &R, permissions: &[&str]) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        self.has_all_roles(request, permissions).await
    }

    pub async fn is_authenticated<R>(&self, request: &R) -> WardenResult<bool>
    where
        R: InboundRequest + ?Sized,
    {
        Ok(self
            .authentication
            .current_session(request, false)
            .await?
            .is_some())
    }
}
