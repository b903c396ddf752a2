//! Logging, polling and AMF event helpers shared by the scenario tests

use std::future::Future;
use std::time::Duration;

use nextgamf_amf::AmfEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, timeout_at, Instant};
use tracing_subscriber::EnvFilter;

/// Result type for integration tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for any single wait in a scenario
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Installs a test-writer subscriber once per test binary.
///
/// `RUST_LOG` overrides the default of `info,nextgamf_amf=debug`.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nextgamf_amf=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Polls `condition` every `poll_interval` until it holds or `within` runs out.
pub async fn wait_for_condition<F, Fut>(
    mut condition: F,
    within: Duration,
    poll_interval: Duration,
) -> TestResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + within;
    loop {
        if condition().await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("condition not met within {within:?}").into());
        }
        sleep(poll_interval).await;
    }
}

/// Waits for the first AMF event matching `predicate`, skipping others.
///
/// A lagging receiver is an error: the events it lost may have been the
/// ones the test is looking for.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<AmfEvent>,
    mut predicate: F,
    within: Duration,
) -> TestResult<AmfEvent>
where
    F: FnMut(&AmfEvent) -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        match timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return Ok(event),
            Ok(Ok(_)) => {}
            Ok(Err(RecvError::Lagged(missed))) => {
                return Err(format!("event receiver lagged, {missed} events lost").into())
            }
            Ok(Err(RecvError::Closed)) => return Err("AMF event channel closed".into()),
            Err(_) => return Err(format!("no matching event within {within:?}").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_condition_met_after_a_few_polls() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();

        wait_for_condition(
            || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_condition_never_met() {
        let err = wait_for_condition(
            || async { false },
            Duration::from_millis(60),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not met"));
    }

    #[tokio::test]
    async fn test_wait_for_event_skips_non_matching() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(AmfEvent::AssociationDown { association_id: 1 }).unwrap();
        tx.send(AmfEvent::UeContextRemoved { amf_ue_ngap_id: 5 }).unwrap();

        let event = wait_for_event(
            &mut rx,
            |e| e.amf_ue_ngap_id().is_some(),
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert_eq!(event, AmfEvent::UeContextRemoved { amf_ue_ngap_id: 5 });

        assert!(wait_for_event(&mut rx, |_| true, Duration::from_millis(50))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_wait_for_event_reports_lag() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(AmfEvent::AssociationDown { association_id: 1 }).unwrap();
        tx.send(AmfEvent::AssociationDown { association_id: 2 }).unwrap();

        let err = wait_for_event(&mut rx, |_| true, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("lagged"));
    }
}
