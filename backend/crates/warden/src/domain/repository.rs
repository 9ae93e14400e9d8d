//! Repository Traits
//!
//! Storage and metadata seams. Implementations live in the infra layer or
//! in the host application.

use crate::domain::entity::{
    authority::Authority, catalog::Catalog, page::Page, session::Session,
    subject::SubjectDetails,
};
use crate::error::WardenResult;

/// Session store contract shared by the local and distributed variants
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Create a session for an enabled subject
    ///
    /// Fails with `AccountDisabled` (creating nothing) when the subject is
    /// not enabled.
    async fn create(&self, details: SubjectDetails, host: Option<String>) -> WardenResult<Session>;

    /// Session currently held by `principal`
    async fn get_by_principal(&self, principal: &str) -> WardenResult<Option<Session>>;

    async fn read(&self, session_id: &str) -> WardenResult<Option<Session>>;

    /// Refresh last access time and persist; returns the stored session
    async fn update(&self, session: Session) -> WardenResult<Session>;

    /// Remove the session and its cached authorities
    async fn delete(&self, session: &Session) -> WardenResult<()>;

    async fn active_sessions(&self) -> WardenResult<Vec<Session>>;

    /// `None` when the backend cannot page (local variant)
    async fn active_sessions_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> WardenResult<Option<Page<Session>>>;

    /// Periodic expiry maintenance
    async fn sweep_expired(&self) -> WardenResult<()>;

    async fn subject_authorities(&self, session_id: &str) -> WardenResult<Option<Vec<Authority>>>;

    async fn set_subject_authorities(
        &self,
        session_id: &str,
        authorities: Vec<Authority>,
    ) -> WardenResult<()>;

    async fn clear_subject_authorities(&self, session_id: &str) -> WardenResult<()>;

    async fn clear_all_subject_authorities(&self) -> WardenResult<()>;
}

/// Source of authorization metadata, implemented by the host
#[trait_variant::make(AuthorizationMetadataProvider: Send)]
pub trait LocalAuthorizationMetadataProvider {
    /// Protected path patterns and their required authorities
    async fn load_catalog(&self) -> WardenResult<Catalog>;

    async fn load_subject_authorities(&self, session: &Session) -> WardenResult<Vec<Authority>>;
}
