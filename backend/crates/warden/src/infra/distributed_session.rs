//! Distributed session store
//!
//! Key layout in the shared store:
//!
//! | Key                         | Type   | Content                           |
//! |-----------------------------|--------|-----------------------------------|
//! | `session_prefix + id`       | string | session JSON, `EX global_timeout` |
//! | `active_session_key`        | zset   | id scored by creation epoch ms    |
//! | `active_user_key`           | hash   | principal -> id                   |
//! | `user_cached_key + ":" + id`| string | authorities JSON                  |
//!
//! The primary record is authoritative. Both indices are eventually
//! consistent with it and are repaired by [`DistributedSessionStore::reconcile`]
//! and by the key expiry/deletion notifications.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::config::WardenConfig;
use crate::domain::cache::Cache;
use crate::domain::entity::{Authority, Page, Session, SubjectDetails};
use crate::domain::event::{SessionEvents, SessionListener};
use crate::domain::repository::SessionRepository;
use crate::domain::store::{SharedStore, TTL_MISSING, TTL_PERSISTENT};
use crate::error::{WardenError, WardenResult};
use crate::infra::store_cache::StoreCache;

/// Outcome of an index reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Live primary records found
    pub live: usize,
    /// Principal -> id entries removed
    pub stale_users: usize,
    /// Sorted-set members removed
    pub stale_sessions: usize,
}

pub struct DistributedSessionStore<S> {
    store: Arc<S>,
    authorities: StoreCache<S, Vec<Authority>>,
    config: Arc<WardenConfig>,
    events: SessionEvents,
}

impl<S> Clone for DistributedSessionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            authorities: self.authorities.clone(),
            config: Arc::clone(&self.config),
            events: self.events.clone(),
        }
    }
}

impl<S> DistributedSessionStore<S>
where
    S: SharedStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, config: Arc<WardenConfig>) -> Self {
        let namespace = format!("{}:", config.authority.user_cached_key);
        let authorities =
            StoreCache::new(Arc::clone(&store), namespace).with_ttl(config.authority.user_expire);
        Self {
            store,
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

    fn timeout_secs(&self) -> u64 {
        self.config.session.global_timeout_secs()
    }

    async fn load(&self, session_id: &str) -> WardenResult<Option<Session>> {
        let raw = self.store.get(&self.session_key(session_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn load_many(&self, keys: &[String]) -> WardenResult<Vec<Session>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::with_capacity(keys.len());
        // nil slots are records that expired between the index read and MGET
        for json in self.store.mget(keys).await?.into_iter().flatten() {
            sessions.push(serde_json::from_str(&json)?);
        }
        Ok(sessions)
    }

    /// TTL to write on update, following the renewal policy
    fn renewed_ttl(&self, session_id: &str, remaining: i64) -> WardenResult<u64> {
        let global = self.timeout_secs();
        let session = &self.config.session;
        match remaining {
            TTL_MISSING => Err(WardenError::InvalidSession(session_id.to_string())),
            TTL_PERSISTENT => {
                tracing::warn!(session_id = %session_id, ttl = global, "Session had no TTL, reset to global timeout");
                Ok(global)
            }
            remaining if remaining as u64 == global || !session.renew => Ok(remaining.max(1) as u64),
            remaining => {
                let ratio = session.effective_ratio();
                let left = remaining as f64 / global as f64;
                if left < ratio {
                    tracing::debug!(
                        session_id = %session_id,
                        remaining,
                        ratio,
                        "Session TTL renewed to global timeout"
                    );
                    Ok(global)
                } else {
                    Ok(remaining.max(1) as u64)
                }
            }
        }
    }

    /// Drop index entries and cached authorities for a session id
    async fn forget(&self, session_id: &str) -> WardenResult<()> {
        let session_cfg = &self.config.session;
        self.store
            .zrem(&session_cfg.active_session_key, &[session_id.to_string()])
            .await?;

        let stale: Vec<String> = self
            .store
            .hgetall(&session_cfg.active_user_key)
            .await?
            .into_iter()
            .filter(|(_, id)| id == session_id)
            .map(|(principal, _)| principal)
            .collect();
        self.store.hdel(&session_cfg.active_user_key, &stale).await?;

        self.authorities.remove(session_id).await?;
        Ok(())
    }

    /// Compare both indices against the live primary keys and drop dangling
    /// entries. With no live sessions at all, both indices and every cached
    /// authority list are removed.
    pub async fn reconcile(&self) -> WardenResult<ReconcileReport> {
        let session_cfg = &self.config.session;
        let live: HashSet<String> = self
            .store
            .keys_with_prefix(&session_cfg.session_prefix)
            .await?
            .into_iter()
            .collect();

        if live.is_empty() {
            self.store.del(&session_cfg.active_user_key).await?;
            self.store.del(&session_cfg.active_session_key).await?;
            self.authorities.clear().await?;
            tracing::info!("No live sessions, session indices cleared");
            return Ok(ReconcileReport::default());
        }

        let stale_users: Vec<String> = self
            .store
            .hgetall(&session_cfg.active_user_key)
            .await?
            .into_iter()
            .filter(|(_, id)| !live.contains(&self.session_key(id)))
            .map(|(principal, _)| principal)
            .collect();
        if !stale_users.is_empty() {
            self.store.hdel(&session_cfg.active_user_key, &stale_users).await?;
        }

        let stale_sessions: Vec<String> = self
            .store
            .zrange(&session_cfg.active_session_key, 0, -1)
            .await?
            .into_iter()
            .filter(|id| !live.contains(&self.session_key(id)))
            .collect();
        if !stale_sessions.is_empty() {
            self.store
                .zrem(&session_cfg.active_session_key, &stale_sessions)
                .await?;
        }

        let report = ReconcileReport {
            live: live.len(),
            stale_users: stale_users.len(),
            stale_sessions: stale_sessions.len(),
        };
        tracing::info!(
            live = report.live,
            stale_users = report.stale_users,
            stale_sessions = report.stale_sessions,
            "Session indices reconciled"
        );
        Ok(report)
    }

    /// Shared-store notification: `key` lapsed by TTL
    pub async fn on_key_expired(&self, key: &str) -> WardenResult<()> {
        self.on_key_removed(key, "expired").await
    }

    /// Shared-store notification: `key` was deleted
    pub async fn on_key_deleted(&self, key: &str) -> WardenResult<()> {
        self.on_key_removed(key, "deleted").await
    }

    async fn on_key_removed(&self, key: &str, reason: &'static str) -> WardenResult<()> {
        let Some(session_id) = key.strip_prefix(&self.config.session.session_prefix) else {
            return Ok(());
        };
        if session_id.is_empty() {
            return Ok(());
        }
        tracing::debug!(session_id = %session_id, reason, "Session key removed, cleaning indices");
        self.forget(session_id).await
    }
}

impl<S> SessionRepository for DistributedSessionStore<S>
where
    S: SharedStore + Send + Sync + 'static,
{
    async fn create(&self, details: SubjectDetails, host: Option<String>) -> WardenResult<Session> {
        if !details.enabled {
            return Err(WardenError::AccountDisabled);
        }

        // Concurrent logins that slipped past the coordinator renew instead
        if let Some(existing) = self.get_by_principal(&details.principal).await? {
            if !existing.is_timed_out() {
                tracing::debug!(principal = %existing.principal(), session_id = %existing.id, "Live session exists, renewing");
                return self.update(existing).await;
            }
        }

        let timeout = self.timeout_secs();
        let session = Session::new(details, host, timeout as i64);
        let json = serde_json::to_string(&session)?;
        let session_cfg = &self.config.session;

        self.store
            .set_ex(&self.session_key(&session.id), &json, timeout)
            .await?;
        self.store
            .zadd(
                &session_cfg.active_session_key,
                &session.id,
                session.created_millis(),
            )
            .await?;
        self.store
            .hset(&session_cfg.active_user_key, session.principal(), &session.id)
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
        let session_id = self
            .store
            .hget(&self.config.session.active_user_key, principal)
            .await?;
        match session_id {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }

    async fn read(&self, session_id: &str) -> WardenResult<Option<Session>> {
        let session = self.load(session_id).await?;
        if let Some(session) = &session {
            self.events.read(session);
        }
        Ok(session)
    }

    async fn update(&self, mut session: Session) -> WardenResult<Session> {
        let key = self.session_key(&session.id);
        let remaining = self.store.ttl(&key).await?;
        let ttl = self.renewed_ttl(&session.id, remaining)?;

        session.touch();
        let json = serde_json::to_string(&session)?;
        // the record may have been deleted since the TTL read
        if !self.store.set_ex_existing(&key, &json, ttl).await? {
            return Err(WardenError::InvalidSession(session.id));
        }
        self.events.updated(&session);

        Ok(self.load(&session.id).await?.unwrap_or(session))
    }

    async fn delete(&self, session: &Session) -> WardenResult<()> {
        let session_cfg = &self.config.session;
        self.authorities.remove(&session.id).await?;
        self.store.del(&self.session_key(&session.id)).await?;
        self.store
            .zrem(&session_cfg.active_session_key, &[session.id.clone()])
            .await?;

        // A newer login may already own the principal entry
        let indexed = self
            .store
            .hget(&session_cfg.active_user_key, session.principal())
            .await?;
        if indexed.as_deref() == Some(session.id.as_str()) {
            self.store
                .hdel(&session_cfg.active_user_key, &[session.principal().to_string()])
                .await?;
        }

        tracing::debug!(session_id = %session.id, "Session deleted");
        self.events.deleted(session);
        Ok(())
    }

    async fn active_sessions(&self) -> WardenResult<Vec<Session>> {
        let keys = self
            .store
            .keys_with_prefix(&self.config.session.session_prefix)
            .await?;
        self.load_many(&keys).await
    }

    async fn active_sessions_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> WardenResult<Option<Page<Session>>> {
        if page_size == 0 {
            return Ok(Some(Page::empty(page_no, page_size)));
        }
        let session_cfg = &self.config.session;
        let size = i64::from(page_size);
        let start = (i64::from(page_no) - 1).max(0) * size;
        let end = start + size - 1;

        let ids = self
            .store
            .zrange(&session_cfg.active_session_key, start, end)
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.session_key(id)).collect();
        let records = self.load_many(&keys).await?;
        let total = self.store.zcard(&session_cfg.active_session_key).await?;

        tracing::debug!(page_no, page_size, total, records = records.len(), "Active sessions page");
        Ok(Some(Page::new(page_no, page_size, total, records)))
    }

    async fn sweep_expired(&self) -> WardenResult<()> {
        self.reconcile().await?;
        let sessions = self.active_sessions().await?;
        self.events.swept(&sessions);
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
