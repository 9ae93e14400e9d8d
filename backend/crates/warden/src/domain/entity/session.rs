//! Session Entity
//!
//! Server-side record of an authenticated login, keyed by an opaque id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entity::subject::SubjectDetails;

/// Session entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// 32 lowercase hex chars
    pub id: String,
    pub start_timestamp: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    /// Idle timeout in seconds; negative means never
    pub timeout: i64,
    /// Set by the expiry sweep
    pub expired: bool,
    pub host: Option<String>,
    pub details: SubjectDetails,
}

impl Session {
    /// Create a new session with a fresh id
    pub fn new(details: SubjectDetails, host: Option<String>, timeout: i64) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().simple().to_string(),
            start_timestamp: now,
            last_access_time: now,
            timeout,
            expired: false,
            host,
            details,
        }
    }

    pub fn principal(&self) -> &str {
        &self.details.principal
    }

    /// True iff `expired`, or idle for longer than `timeout` seconds
    pub fn is_timed_out(&self) -> bool {
        self.is_timed_out_at(Utc::now())
    }

    pub fn is_timed_out_at(&self, now: DateTime<Utc>) -> bool {
        if self.expired {
            return true;
        }
        if self.timeout < 0 {
            return false;
        }
        now - self.last_access_time > Duration::seconds(self.timeout)
    }

    /// Update last access timestamp
    pub fn touch(&mut self) {
        self.last_access_time = Utc::now();
    }

    /// Creation time in epoch milliseconds (active-session index score)
    pub fn created_millis(&self) -> i64 {
        self.start_timestamp.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(timeout: i64) -> Session {
        Session::new(SubjectDetails::new("PC:1"), None, timeout)
    }

    #[test]
    fn test_id_is_simple_uuid() {
        let s = session(60);
        assert_eq!(s.id.len(), 32);
        assert!(s.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(s.id, session(60).id);
    }

    #[test]
    fn test_idle_timeout_boundary() {
        let s = session(60);
        let at_limit = s.last_access_time + Duration::seconds(60);
        assert!(!s.is_timed_out_at(at_limit));
        assert!(s.is_timed_out_at(at_limit + Duration::milliseconds(1)));
    }

    #[test]
    fn test_negative_timeout_never_times_out() {
        let s = session(-1);
        assert!(!s.is_timed_out_at(s.last_access_time + Duration::days(3650)));
    }

    #[test]
    fn test_expired_flag_wins() {
        let mut s = session(-1);
        s.expired = true;
        assert!(s.is_timed_out_at(s.last_access_time));
    }

    #[test]
    fn test_touch_resets_idle_clock() {
        let mut s = session(60);
        s.last_access_time -= Duration::seconds(120);
        assert!(s.is_timed_out());
        s.touch();
        assert!(!s.is_timed_out());
    }
}
