//! Expiry sweeper
//!
//! The one background task the core owns: periodic `sweep_expired` on the
//! session store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::application::config::{
    DEFAULT_SWEEP_INITIAL_DELAY, DEFAULT_SWEEP_PERIOD, SchedulerConfig,
};
use crate::domain::repository::SessionRepository;

/// Start the sweep task
///
/// The first sweep runs after `initial_delay`, then one every `period`.
/// A failing or panicking iteration is logged and the schedule continues.
/// Abort the returned handle to stop it.
pub fn spawn_sweeper<S>(store: Arc<S>, config: SchedulerConfig) -> JoinHandle<()>
where
    S: SessionRepository + Send + Sync + 'static,
{
    let initial_delay = at_least_one_second(config.initial_delay, DEFAULT_SWEEP_INITIAL_DELAY);
    let period = at_least_one_second(config.period, DEFAULT_SWEEP_PERIOD);

    tracing::info!(
        initial_delay_secs = initial_delay.as_secs(),
        period_secs = period.as_secs(),
        "Session sweeper scheduled"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let store = Arc::clone(&store);
            match tokio::spawn(async move { store.sweep_expired().await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Session sweep failed"),
                Err(e) => tracing::warn!(error = %e, "Session sweep aborted"),
            }
        }
    })
}

fn at_least_one_second(value: Duration, fallback: Duration) -> Duration {
    if value < Duration::from_secs(1) {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::WardenConfig;
    use crate::domain::entity::Session;
    use crate::domain::event::{ListenerResult, SessionListener};
    use crate::infra::local_session::InProcessSessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct SweepCounter {
        sweeps: AtomicUsize,
    }

    impl SessionListener for SweepCounter {
        fn after_sweep(&self, _sessions: &[Session]) -> ListenerResult {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanicOnSweep;

    impl SessionListener for PanicOnSweep {
        fn after_sweep(&self, _sessions: &[Session]) -> ListenerResult {
            panic!("sweep listener exploded");
        }
    }

    fn scheduler(initial: u64, period: u64) -> SchedulerConfig {
        SchedulerConfig {
            initial_delay: Duration::from_secs(initial),
            period: Duration::from_secs(period),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay_then_periodically() {
        let counter = Arc::new(SweepCounter::default());
        let store = InProcessSessionStore::new(Arc::new(WardenConfig::default()))
            .with_listener(Arc::new(PanicOnSweep))
            .with_listener(counter.clone());
        let handle = spawn_sweeper(Arc::new(store), scheduler(10, 5));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(counter.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.sweeps.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.sweeps.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[test]
    fn test_sub_second_values_fall_back() {
        assert_eq!(
            at_least_one_second(Duration::ZERO, DEFAULT_SWEEP_PERIOD),
            DEFAULT_SWEEP_PERIOD
        );
        assert_eq!(
            at_least_one_second(Duration::from_secs(7), DEFAULT_SWEEP_PERIOD),
            Duration::from_secs(7)
        );
    }
}
