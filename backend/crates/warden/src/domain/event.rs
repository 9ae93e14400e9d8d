//! Session and authentication listeners
//!
//! Listeners are invoked synchronously, in registration order. A listener
//! that returns an error or panics is logged and skipped; the operation that
//! fired the event always proceeds.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::domain::entity::session::Session;

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
pub type ListenerResult = Result<(), ListenerError>;

/// Observer of session store operations
pub trait SessionListener: Send + Sync {
    fn after_created(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn after_read(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn after_updated(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn after_deleted(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    /// Fired after an expiry sweep with the sessions it examined
    fn after_sweep(&self, _sessions: &[Session]) -> ListenerResult {
        Ok(())
    }
}

/// How a login attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Concurrent login is on and the principal already had a live session
    RejectedDuplicate,
    /// The principal's previous session was deleted
    KickedPrevious,
    CreatedNew,
}

impl LoginOutcome {
    pub fn code(&self) -> u8 {
        match self {
            LoginOutcome::RejectedDuplicate => 0,
            LoginOutcome::KickedPrevious => 1,
            LoginOutcome::CreatedNew => 2,
        }
    }
}

/// Observer of authentication coordinator operations
pub trait AuthenticationListener: Send + Sync {
    /// For `RejectedDuplicate` and `KickedPrevious` the session is the
    /// pre-existing one
    fn on_login(&self, _outcome: LoginOutcome, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn on_logout(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn on_session_kick_out(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }

    fn on_principal_kick_out(&self, _session: &Session) -> ListenerResult {
        Ok(())
    }
}

fn notify<L: ?Sized>(listeners: &[Arc<L>], event: &'static str, f: impl Fn(&L) -> ListenerResult) {
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(event = event, error = %e, "Listener failed"),
            Err(_) => tracing::error!(event = event, "Listener panicked"),
        }
    }
}

/// Ordered fan-out to session listeners
#[derive(Clone, Default)]
pub struct SessionEvents {
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl SessionEvents {
    pub fn register(&mut self, listener: Arc<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn created(&self, session: &Session) {
        notify(&self.listeners, "after_created", |l| l.after_created(session));
    }

    pub fn read(&self, session: &Session) {
        notify(&self.listeners, "after_read", |l| l.after_read(session));
    }

    pub fn updated(&self, session: &Session) {
        notify(&self.listeners, "after_updated", |l| l.after_updated(session));
    }

    pub fn deleted(&self, session: &Session) {
        notify(&self.listeners, "after_deleted", |l| l.after_deleted(session));
    }

    pub fn swept(&self, sessions: &[Session]) {
        notify(&self.listeners, "after_sweep", |l| l.after_sweep(sessions));
    }
}

/// Ordered fan-out to authentication listeners
#[derive(Clone, Default)]
pub struct AuthenticationEvents {
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl AuthenticationEvents {
    pub fn register(&mut self, listener: Arc<dyn AuthenticationListener>) {
        self.listeners.push(listener);
    }

    pub fn login(&self, outcome: LoginOutcome, session: &Session) {
        notify(&self.listeners, "on_login", |l| l.on_login(outcome, session));
    }

    pub fn logout(&self, session: &Session) {
        notify(&self.listeners, "on_logout", |l| l.on_logout(session));
    }

    pub fn session_kicked_out(&self, session: &Session) {
        notify(&self.listeners, "on_session_kick_out", |l| {
            l.on_session_kick_out(session)
        });
    }

    pub fn principal_kicked_out(&self, session: &Session) {
        notify(&self.listeners, "on_principal_kick_out", |l| {
            l.on_principal_kick_out(session)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::subject::SubjectDetails;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl SessionListener for Recorder {
        fn after_created(&self, session: &Session) -> ListenerResult {
            self.seen.lock().unwrap().push(session.principal().to_string());
            Ok(())
        }
    }

    struct Failing;

    impl SessionListener for Failing {
        fn after_created(&self, _session: &Session) -> ListenerResult {
            Err("listener is broken".into())
        }
    }

    struct Panicking;

    impl SessionListener for Panicking {
        fn after_created(&self, _session: &Session) -> ListenerResult {
            panic!("listener exploded");
        }
    }

    #[test]
    fn test_failures_are_isolated_and_order_kept() {
        let recorder = Arc::new(Recorder::default());
        let mut events = SessionEvents::default();
        events.register(Arc::new(Failing));
        events.register(Arc::new(Panicking));
        events.register(recorder.clone());

        let session = Session::new(SubjectDetails::new("PC:1"), None, 60);
        events.created(&session);
        events.created(&session);

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["PC:1", "PC:1"]);
    }

    #[test]
    fn test_login_outcome_codes() {
        assert_eq!(LoginOutcome::RejectedDuplicate.code(), 0);
        assert_eq!(LoginOutcome::KickedPrevious.code(), 1);
        assert_eq!(LoginOutcome::CreatedNew.code(), 2);
    }
}
