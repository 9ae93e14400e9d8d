//! In-memory authorization metadata
//!
//! A provider for hosts whose rules are known at startup (or are pushed in
//! by an admin task). Subject authorities come from an explicit
//! per-principal table, falling back to what the session already carries.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::entity::{Authority, Catalog, Session};
use crate::domain::repository::AuthorizationMetadataProvider;
use crate::error::WardenResult;

#[derive(Clone, Default)]
pub struct StaticMetadataProvider {
    catalog: Arc<RwLock<Catalog>>,
    subjects: Arc<RwLock<HashMap<String, Vec<Authority>>>>,
}

impl StaticMetadataProvider {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            subjects: Arc::default(),
        }
    }

    /// Builder form of [`set_subject`](Self::set_subject)
    ///
    /// The table is written in place when this provider is its only owner.
    /// Otherwise the shared lock is tried; an entry that cannot be written
    /// because the table is locked is logged and skipped.
    pub fn with_subject(mut self, principal: impl Into<String>, authorities: Vec<Authority>) -> Self {
        let principal = principal.into();
        if let Some(subjects) = Arc::get_mut(&mut self.subjects) {
            subjects.get_mut().insert(principal, authorities);
            return self;
        }
        match self.subjects.try_write() {
            Ok(mut subjects) => {
                subjects.insert(principal, authorities);
            }
            Err(_) => {
                tracing::warn!(principal = %principal, "Subject table is locked, authorities not set");
            }
        }
        self
    }

    /// Replace the catalog; cached copies are refreshed by the engine
    pub async fn replace_catalog(&self, catalog: Catalog) {
        *self.catalog.write().await = catalog;
    }

    pub async fn set_subject(&self, principal: impl Into<String>, authorities: Vec<Authority>) {
        self.subjects.write().await.insert(principal.into(), authorities);
    }
}

/// Authorities a subject carries directly: its own list plus its roles
pub fn carried_authorities(session: &Session) -> Vec<Authority> {
    let details = &session.details;
    details
        .authorities
        .iter()
        .cloned()
        .chain(details.roles.iter().map(Authority::simple))
        .collect()
}

impl AuthorizationMetadataProvider for StaticMetadataProvider {
    async fn load_catalog(&self) -> WardenResult<Catalog> {
        Ok(self.catalog.read().await.clone())
    }

    async fn load_subject_authorities(&self, session: &Session) -> WardenResult<Vec<Authority>> {
        if let Some(authorities) = self.subjects.read().await.get(session.principal()) {
            return Ok(authorities.clone());
        }
        Ok(carried_authorities(session))
    }
}
