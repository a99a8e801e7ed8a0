//! Background polling of the sensor bridge.
//!
//! One worker thread per running poller issues a request, classifies the
//! reply, publishes it, then sleeps for the poll interval. Requests never
//! overlap. Stopping bumps a generation counter under the publish lock, so a
//! request that was in flight when the poller stopped is discarded instead of
//! resurrecting a cleared status.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::model::TagInfo;

use super::bridge::SensorBridge;
use super::classify::{PollStatus, TagCatalog, classify};

/// Default pause between two requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How the poller schedules requests and which tags it recognizes.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub catalog: TagCatalog,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            catalog: TagCatalog::new(TagInfo::defaults()),
        }
    }
}

#[derive(Default)]
struct Shared {
    generation: AtomicU64,
    latest: Mutex<Option<PollStatus>>,
}

impl Shared {
    fn latest(&self) -> MutexGuard<'_, Option<PollStatus>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Polls a [`SensorBridge`] on a worker thread and keeps the latest status.
pub struct NfcPoller {
    bridge: Arc<dyn SensorBridge>,
    config: PollerConfig,
    shared: Arc<Shared>,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl NfcPoller {
    pub fn new(bridge: Arc<dyn SensorBridge>, config: PollerConfig) -> Self {
        Self {
            bridge,
            config,
            shared: Arc::new(Shared::default()),
            stop_tx: None,
        }
    }

    /// Starts polling for `expected`, replacing any running worker.
    pub fn start(&mut self, expected: Option<&str>) {
        self.stop();

        let generation = self.shared.generation.load(Ordering::SeqCst);
        let (stop_tx, stop_rx) = mpsc::channel();
        let worker = Worker {
            bridge: Arc::clone(&self.bridge),
            catalog: self.config.catalog.clone(),
            expected: expected.map(String::from),
            interval: self.config.interval,
            shared: Arc::clone(&self.shared),
            generation,
        };
        thread::spawn(move || worker.run(&stop_rx));
        self.stop_tx = Some(stop_tx);
        info!(expected, generation, "sensor polling started");
    }

    /// Stops polling and forgets the latest status.
    ///
    /// Returns without waiting for an in-flight request; its result is dropped.
    pub fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let mut latest = self.shared.latest();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        *latest = None;
        drop(latest);
        drop(stop_tx);
        info!("sensor polling stopped");
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// The most recent status published by the running worker.
    pub fn latest(&self) -> Option<PollStatus> {
        self.shared.latest().clone()
    }

    /// Performs one request on the calling thread.
    pub fn poll_once(&self, expected: Option<&str>) -> PollStatus {
        classify(self.bridge.fetch_status(), &self.config.catalog, expected)
    }
}

impl Drop for NfcPoller {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

struct Worker {
    bridge: Arc<dyn SensorBridge>,
    catalog: TagCatalog,
    expected: Option<String>,
    interval: Duration,
    shared: Arc<Shared>,
    generation: u64,
}

impl Worker {
    fn run(self, stop_rx: &mpsc::Receiver<()>) {
        let mut last_label = None;
        loop {
            let status = classify(
                self.bridge.fetch_status(),
                &self.catalog,
                self.expected.as_deref(),
            );
            {
                let mut latest = self.shared.latest();
                if self.shared.generation.load(Ordering::SeqCst) != self.generation {
                    debug!(generation = self.generation, "discarding stale poll result");
                    return;
                }
                if last_label != Some(status.label()) {
                    info!(status = status.label(), "{}", status.message());
                    last_label = Some(status.label());
                } else {
                    debug!(status = status.label(), "poll tick");
                }
                *latest = Some(status);
            }

            match stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use crate::sensor::bridge::{BridgeError, BridgeReply};

    /// Always answers with the same result and counts requests.
    struct FixedBridge {
        result: Result<BridgeReply, BridgeError>,
        calls: AtomicUsize,
    }

    impl FixedBridge {
        fn new(result: Result<BridgeReply, BridgeError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SensorBridge for FixedBridge {
        fn fetch_status(&self) -> Result<BridgeReply, BridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Blocks each request until the test releases it.
    struct GatedBridge {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SensorBridge for GatedBridge {
        fn fetch_status(&self) -> Result<BridgeReply, BridgeError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(detected_reply("LEAK"))
        }
    }

    fn detected_reply(tag: &str) -> BridgeReply {
        BridgeReply {
            tag_detected: true,
            last_tag_id: Some(tag.into()),
            ..BridgeReply::default()
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(10),
            ..PollerConfig::default()
        }
    }

    fn wait_for(poller: &NfcPoller, done: impl Fn(&Option<PollStatus>) -> bool) -> Option<PollStatus> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let latest = poller.latest();
            if done(&latest) || Instant::now() > deadline {
                return latest;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn publishes_detection_for_expected_tag() {
        let bridge = FixedBridge::new(Ok(detected_reply("SUPPLY_LEFT")));
        let mut poller = NfcPoller::new(bridge, fast_config());

        poller.start(Some("SUPPLY_LEFT"));
        let latest = wait_for(&poller, Option::is_some);

        assert!(poller.is_running());
        assert!(latest.is_some_and(|s| s.is_positive()));
    }

    #[test]
    fn publishes_offline_status() {
        let bridge = FixedBridge::new(Err(BridgeError::Offline("refused".into())));
        let mut poller = NfcPoller::new(bridge, fast_config());

        poller.start(None);
        let latest = wait_for(&poller, Option::is_some);

        assert!(matches!(latest, Some(PollStatus::ServerOffline { .. })));
    }

    #[test]
    fn keeps_polling_on_the_interval() {
        let bridge = FixedBridge::new(Ok(BridgeReply::default()));
        let mut poller = NfcPoller::new(Arc::clone(&bridge) as Arc<dyn SensorBridge>, fast_config());

        poller.start(None);
        let deadline = Instant::now() + Duration::from_secs(5);
        while bridge.calls.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(bridge.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(poller.latest(), Some(PollStatus::Waiting));
    }

    #[test]
    fn stop_clears_status_and_halts_requests() {
        let bridge = FixedBridge::new(Ok(BridgeReply::default()));
        let mut poller = NfcPoller::new(Arc::clone(&bridge) as Arc<dyn SensorBridge>, fast_config());
        poller.start(None);
        wait_for(&poller, Option::is_some);

        poller.stop();
        let after_stop = bridge.calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));

        assert!(!poller.is_running());
        assert_eq!(poller.latest(), None);
        // A request already past its sleep may still run once.
        assert!(bridge.calls.load(Ordering::SeqCst) <= after_stop + 1);
    }

    #[test]
    fn in_flight_result_after_stop_is_discarded() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let bridge = Arc::new(GatedBridge {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let mut poller = NfcPoller::new(bridge, fast_config());

        poller.start(Some("LEAK"));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        poller.stop();
        release_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(poller.latest(), None);
    }

    #[test]
    fn poll_once_runs_inline() {
        let bridge = FixedBridge::new(Ok(detected_reply("RETURN_RIGHT")));
        let poller = NfcPoller::new(Arc::clone(&bridge) as Arc<dyn SensorBridge>, fast_config());

        let status = poller.poll_once(Some("SUPPLY_LEFT"));

        assert!(matches!(status, PollStatus::WrongPosition { .. }));
        assert_eq!(bridge.calls.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());
    }
}
