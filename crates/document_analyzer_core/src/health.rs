//! crates/document_analyzer_core/src/health.rs
//!
//! Liveness monitor for the remote analysis service.
//!
//! The monitor publishes a tri-state [`ServiceAvailability`] through a `watch`
//! channel. It starts in `Checking` and moves to `Online` or `Offline` after the
//! first probe completes, then follows the latest probe only. Probe failures never
//! escape the monitor, they simply read as `Offline`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::ServiceAvailability;
use crate::ports::HttpTransport;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Probes the `/health` endpoint of the remote service.
#[derive(Clone)]
pub struct HealthMonitor {
    transport: Arc<dyn HttpTransport>,
    health_url: String,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One bounded liveness check. True only for a 2xx answer within the timeout.
    pub async fn probe(&self) -> bool {
        // The transport is asked to honour the timeout too, but the outer bound
        // holds even if it doesn't.
        let request = self.transport.get(&self.health_url, Some(self.timeout));
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                debug!(status = response.status, "Health probe answered");
                response.is_success()
            }
            Ok(Err(e)) => {
                debug!("Health probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Health probe timed out after {:?}", self.timeout);
                false
            }
        }
    }

    /// Starts probing on a fixed schedule, the first probe immediately.
    ///
    /// At most one probe is in flight; ticks that fall due while a probe is still
    /// running are dropped rather than queued.
    pub fn start_polling(&self, interval: Duration) -> PollingHandle {
        let (tx, rx) = watch::channel(ServiceAvailability::Checking);
        let token = CancellationToken::new();
        let monitor = self.clone();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let online = tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    online = monitor.probe() => online,
                };

                let next = if online {
                    ServiceAvailability::Online
                } else {
                    ServiceAvailability::Offline
                };
                let previous = *tx.borrow();
                if previous != next {
                    match next {
                        ServiceAvailability::Offline => {
                            warn!(url = %monitor.health_url, "Analysis service is offline")
                        }
                        _ => info!(url = %monitor.health_url, "Analysis service is online"),
                    }
                }
                tx.send_replace(next);
            }
            debug!("Health polling stopped");
        });

        PollingHandle {
            token,
            receiver: rx,
            task: Some(task),
        }
    }
}

/// Owns a running poller. Dropping the handle does not stop polling; call
/// [`PollingHandle::stop`].
pub struct PollingHandle {
    token: CancellationToken,
    receiver: watch::Receiver<ServiceAvailability>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// A fresh receiver of availability updates.
    pub fn subscribe(&self) -> watch::Receiver<ServiceAvailability> {
        self.receiver.clone()
    }

    pub fn availability(&self) -> ServiceAvailability {
        *self.receiver.borrow()
    }

    /// Stops polling. Idempotent. No probe is issued and no state is published
    /// after this returns.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Err(e) if e.is_panic() => warn!("Health poller panicked: {}", e),
                _ => {}
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Reply {
        Status(u16),
        Refused,
        Hang(Duration),
    }

    /// Plays back scripted health replies; the last one repeats forever.
    struct ScriptedHealth {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedHealth {
        fn new(replies: &[Reply]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn next_reply(&self) -> Reply {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                *replies.front().unwrap()
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedHealth {
        async fn get(
            &self,
            _url: &str,
            _timeout: Option<Duration>,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let reply = self.next_reply();
            let result = match reply {
                Reply::Status(status) => Ok(TransportResponse::new(status, "{}")),
                Reply::Refused => Err(TransportError::Connection("refused".to_string())),
                Reply::Hang(d) => {
                    tokio::time::sleep(d).await;
                    Ok(TransportResponse::new(200, "{}"))
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Connection("not used".to_string()))
        }
    }

    fn monitor(transport: Arc<ScriptedHealth>) -> HealthMonitor {
        HealthMonitor::new(transport, "http://analyzer.test/")
    }

    #[tokio::test]
    async fn probe_is_true_only_for_2xx() {
        assert!(monitor(ScriptedHealth::new(&[Reply::Status(200)])).probe().await);
        assert!(!monitor(ScriptedHealth::new(&[Reply::Status(503)])).probe().await);
        assert!(!monitor(ScriptedHealth::new(&[Reply::Refused])).probe().await);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_slower_than_timeout_is_offline() {
        let slow = ScriptedHealth::new(&[Reply::Hang(Duration::from_secs(20))]);
        assert!(!monitor(slow).probe().await);

        let fast_enough = ScriptedHealth::new(&[Reply::Hang(Duration::from_secs(14))]);
        assert!(monitor(fast_enough).probe().await);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_checking_then_follows_latest_probe() {
        let transport = ScriptedHealth::new(&[
            Reply::Hang(Duration::from_secs(1)),
            Reply::Status(500),
            Reply::Status(200),
        ]);
        let mut handle = monitor(transport).start_polling(Duration::from_secs(10));
        let mut rx = handle.subscribe();
        assert_eq!(*rx.borrow(), ServiceAvailability::Checking);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ServiceAvailability::Online);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ServiceAvailability::Offline);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ServiceAvailability::Online);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_dropped() {
        // Each probe hangs for 12s (under the 15s timeout) against a 5s interval.
        let transport = ScriptedHealth::new(&[Reply::Hang(Duration::from_secs(12))]);
        let mut handle = monitor(transport.clone()).start_polling(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.stop().await;

        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        // Queued ticks would have issued 13 probes in 60s; dropping them gives about 5.
        let calls = transport.calls.load(Ordering::SeqCst);
        assert!(calls <= 6, "expected dropped ticks, saw {} probes", calls);
    }

    /// A transport that blows up on first use.
    struct PanickingHealth;

    #[async_trait]
    impl HttpTransport for PanickingHealth {
        async fn get(
            &self,
            _url: &str,
            _timeout: Option<Duration>,
        ) -> Result<TransportResponse, TransportError> {
            panic!("transport bug");
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Connection("not used".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_a_crashed_poller_is_quiet() {
        let mut handle = HealthMonitor::new(Arc::new(PanickingHealth), "http://analyzer.test")
            .start_polling(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(1)).await;

        handle.stop().await;
        handle.stop().await;
        assert!(handle.is_stopped());
        assert_eq!(handle.availability(), ServiceAvailability::Checking);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_the_poller() {
        let transport = ScriptedHealth::new(&[Reply::Status(200)]);
        let mut handle = monitor(transport.clone()).start_polling(Duration::from_secs(10));
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();

        handle.stop().await;
        handle.stop().await;
        assert!(handle.is_stopped());

        let calls_at_stop = transport.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), calls_at_stop);
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
