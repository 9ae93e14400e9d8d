//! In-process session store
//!
//! Sessions live in a [`MemoryCache`] keyed by `session_prefix + id`. The
//! sweep first flags an idle session, so a read in between reports
//! `SessionExpired` instead of "not found", and removes it on the next pass.
//! Entries also drop out of the cache two timeouts after their last write
//! when no sweeper runs.

use std::sync::Arc;

use crate::application::config::WardenConfig;
use crate::domain::cache::Cache;
use crate::domain::entity::{Authority, Page, Session, SubjectDetails};
use crate::domain::event::{SessionEvents, SessionListener};
use crate::domain::repository::SessionRepository;
use crate::error::{WardenError, WardenResult};
use crate::infra::memory::{Expiry, MemoryCache};

#[derive(Clone)]
pub struct InProcessSessionStore {
    sessions: MemoryCache<Session>,
    authorities: MemoryCache<Vec<Authority>>,
    config: Arc<WardenConfig>,
    events: SessionEvents,
}

impl InProcessSessionStore {
    pub fn new(config: Arc<WardenConfig>) -> Self {
        let authorities = MemoryCache::new(Expiry::AfterAccess(config.authority.user_expire));
        Self {
            sessions: MemoryCache::new(Expiry::AfterWrite(config.session.global_timeout * 2)),
            authorities,
            config,
            events: SessionEvents::default(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.events.register(listener);
        self
    }

    fn session_key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.session.session_prefix, session_id)
    }
}

impl SessionRepository for InProcessSessionStore {
    async fn create(&self, details: SubjectDetails, host: Option<String>) -> WardenResult<Session> {
        if !details.enabled {
            return Err(WardenError::AccountDisabled);
        }

        let timeout = self.config.session.global_timeout_secs() as i64;
        let session = Session::new(details, host, timeout);
        self.sessions
            .put(&self.session_key(&session.id), session.clone())
            .await?;

        tracing::info!(
            principal = %session.principal(),
            session_id = %session.id,
            "Session created"
        );
        self.events.created(&session);
        Ok(session)
    }

    async fn get_by_principal(&self, principal: &str) -> WardenResult<Option<Session>> {
        let mut found = None;
        for session in self.sessions.values().await? {
            if session.principal() != principal {
                continue;
            }
            if !session.is_timed_out() {
                return Ok(Some(session));
            }
            found.get_or_insert(session);
        }
        Ok(found)
    }

    async fn read(&self, session_id: &str) -> WardenResult<Option<Session>> {
        let session = self.sessions.get(&self.session_key(session_id)).await?;
        if let Some(session) = &session {
            self.events.read(session);
        }
        Ok(session)
    }

    async fn update(&self, mut session: Session) -> WardenResult<Session> {
        session.touch();
        if !self
            .sessions
            .replace_existing(&self.session_key(&session.id), session.clone())
        {
            return Err(WardenError::InvalidSession(session.id));
        }
        tracing::debug!(session_id = %session.id, "Session updated");
        self.events.updated(&session);
        Ok(session)
    }

    async fn delete(&self, session: &Session) -> WardenResult<()> {
        self.authorities.remove(&session.id).await?;
        self.sessions.remove(&self.session_key(&session.id)).await?;
        tracing::debug!(session_id = %session.id, "Session deleted");
        self.events.deleted(session);
        Ok(())
    }

    async fn active_sessions(&self) -> WardenResult<Vec<Session>> {
        let mut sessions = self.sessions.values().await?;
        sessions.retain(|session| !session.is_timed_out());
        Ok(sessions)
    }

    async fn active_sessions_page(
        &self,
        _page_no: u32,
        _page_size: u32,
    ) -> WardenResult<Option<Page<Session>>> {
        Ok(None)
    }

    async fn sweep_expired(&self) -> WardenResult<()> {
        let sessions = self.sessions.values().await?;
        tracing::info!(active = sessions.len(), "Expired session sweep started");

        let (mut flagged, mut removed) = (0usize, 0usize);
        for session in &sessions {
            if session.expired {
                self.delete(session).await?;
                removed += 1;
                continue;
            }
            if !session.is_timed_out() {
                continue;
            }
            let mut expired = session.clone();
            expired.expired = true;
            self.authorities.remove(&expired.id).await?;
            if self
                .sessions
                .replace_existing(&self.session_key(&expired.id), expired)
            {
                tracing::warn!(session_id = %session.id, principal = %session.principal(), "Session expired");
                flagged += 1;
            }
        }

        self.events.swept(&sessions);
        tracing::info!(flagged, removed, "Expired session sweep finished");
        Ok(())
    }

    async fn subject_authorities(&self, session_id: &str) -> WardenResult<Option<Vec<Authority>>> {
        self.authorities.get(session_id).await
    }

    async fn set_subject_authorities(
        &self,
        session_id: &str,
        authorities: Vec<Authority>,
    ) -> WardenResult<()> {
        if authorities.is_empty() {
            tracing::warn!(session_id = %session_id, "Refusing to cache empty authorities");
            return Ok(());
        }
        tracing::debug!(session_id = %session_id, count = authorities.len(), "Caching subject authorities");
        self.authorities.put(session_id, authorities).await?;
        Ok(())
    }

    async fn clear_subject_authorities(&self, session_id: &str) -> WardenResult<()> {
        self.authorities.remove(session_id).await?;
        Ok(())
    }

    async fn clear_all_subject_authorities(&self) -> WardenResult<()> {
        self.authorities.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ListenerResult;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    fn store() -> InProcessSessionStore {
        InProcessSessionStore::new(Arc::new(WardenConfig::default()))
    }

    #[derive(Default)]
    struct Swept {
        batches: Mutex<Vec<usize>>,
    }

    impl SessionListener for Swept {
        fn after_sweep(&self, sessions: &[Session]) -> ListenerResult {
            self.batches.lock().unwrap().push(sessions.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let store = store();
        let session = store
            .create(SubjectDetails::new("PC:1"), Some("10.0.0.1".into()))
            .await
            .unwrap();
        assert_eq!(session.timeout, 3600);
        assert_eq!(session.host.as_deref(), Some("10.0.0.1"));

        let read = store.read(&session.id).await.unwrap().unwrap();
        assert_eq!(read, session);
        assert!(store.read("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_subject_creates_nothing() {
        let store = store();
        let err = store
            .create(SubjectDetails::new("PC:1").disabled(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::AccountDisabled));
        assert!(store.active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_refreshes_access_time() {
        let store = store();
        let mut session = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        session.last_access_time -= Duration::seconds(100);
        let updated = store.update(session).await.unwrap();
        assert!(Utc::now() - updated.last_access_time < Duration::seconds(5));
        assert_eq!(store.read(&updated.id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_after_delete_does_not_resurrect() {
        let store = store();
        let session = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        let stale = session.clone();
        store.delete(&session).await.unwrap();

        let err = store.update(stale).await.unwrap_err();
        assert!(matches!(err, WardenError::InvalidSession(id) if id == session.id));
        assert!(store.read(&session.id).await.unwrap().is_none());
        assert!(store.active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_purges_authorities() {
        let store = store();
        let session = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        store
            .set_subject_authorities(&session.id, vec![Authority::simple("admin")])
            .await
            .unwrap();

        store.delete(&session).await.unwrap();
        assert!(store.read(&session.id).await.unwrap().is_none());
        assert!(store.subject_authorities(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_principal_prefers_live_session() {
        let store = store();
        let stale = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        let mut flagged = stale.clone();
        flagged.expired = true;
        store.sessions.put(&store.session_key(&stale.id), flagged).await.unwrap();
        let live = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();

        let found = store.get_by_principal("PC:1").await.unwrap().unwrap();
        assert_eq!(found.id, live.id);
        assert!(store.get_by_principal("PC:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paging_is_unsupported() {
        assert!(store().active_sessions_page(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_flags_idle_sessions() {
        let swept = Arc::new(Swept::default());
        let store = store().with_listener(swept.clone());
        let idle = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        let fresh = store.create(SubjectDetails::new("PC:2"), None).await.unwrap();
        store
            .set_subject_authorities(&idle.id, vec![Authority::simple("admin")])
            .await
            .unwrap();

        let mut aged = idle.clone();
        aged.last_access_time = Utc::now() - Duration::seconds(3601);
        store.sessions.put(&store.session_key(&idle.id), aged).await.unwrap();

        store.sweep_expired().await.unwrap();

        let idle = store.read(&idle.id).await.unwrap().unwrap();
        assert!(idle.expired);
        assert!(idle.is_timed_out());
        assert!(store.subject_authorities(&idle.id).await.unwrap().is_none());
        assert!(!store.read(&fresh.id).await.unwrap().unwrap().expired);
        assert_eq!(*swept.batches.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_second_sweep_removes_flagged_sessions() {
        let store = store();
        let idle = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();
        let fresh = store.create(SubjectDetails::new("PC:2"), None).await.unwrap();

        let mut aged = idle.clone();
        aged.last_access_time = Utc::now() - Duration::seconds(3601);
        store.sessions.put(&store.session_key(&idle.id), aged).await.unwrap();

        let listed: Vec<_> = store
            .active_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, vec![fresh.id.clone()]);

        store.sweep_expired().await.unwrap();
        assert!(store.read(&idle.id).await.unwrap().unwrap().expired);

        store.sweep_expired().await.unwrap();
        assert!(store.read(&idle.id).await.unwrap().is_none());
        assert!(store.get_by_principal("PC:1").await.unwrap().is_none());
        assert_eq!(store.active_sessions().await.unwrap().len(), 1);
        assert!(store.read(&fresh.id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unswept_sessions_drop_out_of_the_cache() {
        let store = store();
        let session = store.create(SubjectDetails::new("PC:1"), None).await.unwrap();

        tokio::time::advance(std::time::Duration::from_secs(2 * 3600)).await;
        assert!(store.read(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_authorities_are_not_cached() {
        let store = store();
        store.set_subject_authorities("s1", Vec::new()).await.unwrap();
        assert!(store.subject_authorities("s1").await.unwrap().is_none());

        store
            .set_subject_authorities("s1", vec![Authority::simple("user")])
            .await
            .unwrap();
        store.clear_all_subject_authorities().await.unwrap();
        assert!(store.subject_authorities("s1").await.unwrap().is_none());
    }
}
