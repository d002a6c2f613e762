//! Heartbeat monitor.
//!
//! # Responsibilities
//! - Periodically probe every tracked peer, all peers of a tick at once
//! - Update each detection as soon as its own probe completes
//! - Stop promptly when cancelled

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{HeartbeatConfig, MAX_HEARTBEAT_DELAY_MS};
use crate::health::detection::{DetectionList, PeerState, SlaveDetection};
use crate::health::probe::{ProbeError, StatusProbe};
use crate::observability::metrics;

/// When heartbeats run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for MonitorSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(20_000),
            interval: Duration::from_millis(20_000),
        }
    }
}

impl From<&HeartbeatConfig> for MonitorSchedule {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            interval: Duration::from_millis(config.interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("heartbeat task failed: {0}")]
    Task(String),
}

/// Outcome counts of one heartbeat.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub active: usize,
    pub inactive: usize,
}

/// Background liveness tracking, owned by one server instance.
pub struct HeartbeatMonitor {
    detections: Arc<DetectionList>,
    probe: Arc<dyn StatusProbe>,
    schedule: MonitorSchedule,
    running: Option<RunningMonitor>,
}

struct RunningMonitor {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatMonitor {
    pub fn new(
        detections: Arc<DetectionList>,
        probe: Arc<dyn StatusProbe>,
        schedule: MonitorSchedule,
    ) -> Self {
        Self {
            detections,
            probe,
            schedule,
            running: None,
        }
    }

    /// Spawn the heartbeat task. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.running.is_some() {
            tracing::debug!("Heartbeat monitor already running");
            return;
        }

        let (cancel, cancelled) = watch::channel(false);
        let task = HeartbeatTask {
            detections: self.detections.clone(),
            probe: self.probe.clone(),
            schedule: self.schedule,
            cancelled,
        };

        tracing::info!(
            initial_delay_ms = self.schedule.initial_delay.as_millis() as u64,
            interval_ms = self.schedule.interval.as_millis() as u64,
            peers = self.detections.len(),
            "Heartbeat monitor starting"
        );

        self.running = Some(RunningMonitor {
            cancel,
            task: tokio::spawn(task.run()),
        });
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Stop scheduling heartbeats and wait for the task to exit. Probes
    /// already in flight are allowed to finish, which takes at most one probe
    /// timeout. Cancelling a monitor that never started is a no-op.
    pub async fn cancel(&mut self) -> Result<(), MonitorError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.cancel.send(true);
        running
            .task
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))?;

        tracing::info!("Heartbeat monitor stopped");
        Ok(())
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.cancel.send(true);
        }
    }
}

/// The task behind a running monitor.
struct HeartbeatTask {
    detections: Arc<DetectionList>,
    probe: Arc<dyn StatusProbe>,
    schedule: MonitorSchedule,
    cancelled: watch::Receiver<bool>,
}

impl HeartbeatTask {
    async fn run(self) {
        let mut cancelled = self.cancelled.clone();
        let ceiling = Duration::from_millis(MAX_HEARTBEAT_DELAY_MS);
        let first = time::Instant::now() + self.schedule.initial_delay.min(ceiling);
        let mut ticker = time::interval_at(first, self.schedule.interval.min(ceiling));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_cancelled() {
                        break;
                    }
                    let summary = self.tick().await;
                    tracing::debug!(
                        active = summary.active,
                        inactive = summary.inactive,
                        "Heartbeat complete"
                    );
                }
                _ = cancelled.changed() => {
                    break;
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Probe every peer in the current list once. Probes run concurrently,
    /// so one slow peer does not delay the others.
    async fn tick(&self) -> TickSummary {
        let mut pending = FuturesUnordered::new();
        for detection in self.detections.snapshot() {
            if self.is_cancelled() {
                tracing::debug!("Heartbeat cancelled before all peers were probed");
                break;
            }
            pending.push(self.check(detection));
        }

        let mut summary = TickSummary::default();
        while let Some(active) = pending.next().await {
            if active {
                summary.active += 1;
            } else {
                summary.inactive += 1;
            }
        }
        summary
    }

    /// Probe one peer and stamp its detection. Returns whether it answered.
    async fn check(&self, detection: Arc<SlaveDetection>) -> bool {
        let peer = detection.peer();
        let outcome = AssertUnwindSafe(self.probe.probe(peer))
            .catch_unwind()
            .await
            .unwrap_or(Err(ProbeError::Panicked));
        let now = Utc::now();

        match outcome {
            Ok(()) => {
                if detection.mark_active(now) != PeerState::Active {
                    tracing::info!(
                        peer = %peer.name,
                        host = %peer.hostname,
                        port = peer.port,
                        "Peer is active"
                    );
                }
                metrics::record_probe(&peer.name, true);
                true
            }
            Err(e) => {
                if detection.mark_inactive(now) != PeerState::Inactive {
                    tracing::warn!(
                        peer = %peer.name,
                        host = %peer.hostname,
                        port = peer.port,
                        error = %e,
                        "Peer is inactive"
                    );
                } else {
                    tracing::debug!(peer = %peer.name, error = %e, "Peer still inactive");
                }
                metrics::record_probe(&peer.name, false);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::detection::PeerNode;
    use futures_util::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers from a script; names starting with "down" always fail,
    /// "slow" fails after five seconds and "boom" panics.
    #[derive(Default)]
    struct ScriptedProbe {
        script: Mutex<VecDeque<bool>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn with_script(outcomes: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl StatusProbe for ScriptedProbe {
        fn probe<'a>(&'a self, peer: &'a PeerNode) -> BoxFuture<'a, Result<(), ProbeError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if peer.name == "boom" {
                    panic!("probe exploded");
                }
                if peer.name.starts_with("slow") {
                    time::sleep(Duration::from_secs(5)).await;
                    return Err(ProbeError::Timeout(Duration::from_secs(5)));
                }
                if peer.name.starts_with("down") {
                    return Err(ProbeError::Connect("refused".into()));
                }
                match self.script.lock().unwrap().pop_front() {
                    Some(false) => Err(ProbeError::Timeout(Duration::from_secs(1))),
                    _ => Ok(()),
                }
            })
        }
    }

    fn peers(names: &[&str]) -> Arc<DetectionList> {
        Arc::new(DetectionList::from_peers(
            names.iter().map(|n| PeerNode::new(*n, "127.0.0.1", 1, None)),
        ))
    }

    fn task(
        detections: Arc<DetectionList>,
        probe: Arc<dyn StatusProbe>,
    ) -> (HeartbeatTask, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            HeartbeatTask {
                detections,
                probe,
                schedule: MonitorSchedule::default(),
                cancelled: rx,
            },
            tx,
        )
    }

    #[tokio::test]
    async fn failures_do_not_affect_other_peers() {
        let detections = peers(&["up-1", "down-1", "boom", "up-2"]);
        let (task, _tx) = task(detections.clone(), ScriptedProbe::with_script(&[]));

        let summary = task.tick().await;

        assert_eq!(summary, TickSummary { active: 2, inactive: 2 });
        assert_eq!(detections.find("up-1").unwrap().status().state(), PeerState::Active);
        assert_eq!(detections.find("down-1").unwrap().status().state(), PeerState::Inactive);
        assert_eq!(detections.find("boom").unwrap().status().state(), PeerState::Inactive);
        assert_eq!(detections.find("up-2").unwrap().status().state(), PeerState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_peer_does_not_delay_the_others() {
        let detections = peers(&["slow-1", "up-1", "up-2"]);
        let (task, _tx) = task(detections.clone(), ScriptedProbe::with_script(&[]));
        let tick = tokio::spawn(async move { task.tick().await });

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(detections.find("up-1").unwrap().status().state(), PeerState::Active);
        assert_eq!(detections.find("up-2").unwrap().status().state(), PeerState::Active);
        assert_eq!(detections.find("slow-1").unwrap().status().state(), PeerState::Unknown);

        let summary = tick.await.unwrap();
        assert_eq!(summary, TickSummary { active: 2, inactive: 1 });
        assert_eq!(detections.find("slow-1").unwrap().status().state(), PeerState::Inactive);
    }

    #[tokio::test]
    async fn cancelled_tick_skips_remaining_peers() {
        let detections = peers(&["up-1", "up-2"]);
        let probe = ScriptedProbe::with_script(&[]);
        let (task, tx) = task(detections.clone(), probe.clone());

        tx.send(true).unwrap();
        let summary = task.tick().await;

        assert_eq!(summary, TickSummary::default());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(detections.find("up-1").unwrap().status().state(), PeerState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn follows_schedule_and_stops_on_cancel() {
        let detections = peers(&["worker"]);
        let probe = ScriptedProbe::with_script(&[true, false, true]);
        let mut monitor =
            HeartbeatMonitor::new(detections.clone(), probe.clone(), MonitorSchedule::default());

        monitor.start();
        assert!(monitor.is_running());

        time::sleep(Duration::from_secs(19)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(2)).await;
        let after_first = detections.find("worker").unwrap().status();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(after_first.active);

        time::sleep(Duration::from_secs(20)).await;
        let after_second = detections.find("worker").unwrap().status();
        assert!(!after_second.active);
        assert_eq!(after_second.last_active_at, after_first.last_active_at);
        assert!(after_second.last_inactive_at.is_some());

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert!(detections.find("worker").unwrap().status().active);

        monitor.cancel().await.unwrap();
        assert!(!monitor.is_running());

        time::sleep(Duration::from_secs(100)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_without_start_is_ok() {
        let mut monitor = HeartbeatMonitor::new(
            peers(&[]),
            ScriptedProbe::with_script(&[]),
            MonitorSchedule::default(),
        );
        assert!(monitor.cancel().await.is_ok());
        assert!(monitor.cancel().await.is_ok());
    }
}
