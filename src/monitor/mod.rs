//! Live analytics polling for the Guard program
//!
//! A [`AnalyticsMonitor`] refreshes analysis, metrics and network stats on a
//! timer. Each tick runs the three fetches together and folds whatever
//! succeeded into the current [`Snapshot`].

mod snapshot;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use solana_pubkey::Pubkey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::GuardClient;

pub use self::snapshot::{RefreshOutcome, Snapshot};

/// Monitor for program and cluster state
#[derive(Clone)]
pub struct AnalyticsMonitor {
    client: Arc<GuardClient>,
}

impl AnalyticsMonitor {
    pub fn new(client: Arc<GuardClient>) -> Self {
        Self { client }
    }

    /// Run every fetch once. Failures are returned per field and never
    /// cancel the other fetches.
    pub async fn fetch_all(&self, target: Option<&Pubkey>) -> RefreshOutcome {
        let analysis = async {
            match target {
                Some(target) => Some(self.client.fetch_analysis(target).await),
                None => None,
            }
        };
        let (analysis, metrics, network_stats) = tokio::join!(
            analysis,
            self.client.fetch_metrics(),
            self.client.fetch_network_stats(),
        );

        RefreshOutcome {
            analysis,
            metrics,
            network_stats,
        }
    }

    /// One refresh cycle applied to `previous`.
    pub async fn refresh(&self, previous: &Snapshot, target: Option<&Pubkey>) -> Snapshot {
        let outcome = self.fetch_all(target).await;
        let next = previous.merged(outcome);
        if let Some(err) = &next.last_error {
            warn!("{}", err);
        }
        next
    }

    /// Start polling every `refresh_interval`, beginning immediately.
    ///
    /// A zero interval performs a single refresh. Dropping the handle
    /// cancels polling.
    pub fn start(&self, refresh_interval: Duration, target: Option<Pubkey>) -> MonitorHandle {
        let (tx, rx) = watch::channel(Snapshot::default());
        let refreshing = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let monitor = self.clone();
        let task = tokio::spawn(poll_loop(
            monitor,
            refresh_interval,
            target,
            tx,
            refreshing.clone(),
            token.clone(),
        ));

        info!("Started analytics polling every {:?}", refresh_interval);
        MonitorHandle {
            snapshot: rx,
            refreshing,
            token,
            task: Some(task),
        }
    }
}

async fn poll_loop(
    monitor: AnalyticsMonitor,
    refresh_interval: Duration,
    target: Option<Pubkey>,
    tx: watch::Sender<Snapshot>,
    refreshing: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let mut interval = (!refresh_interval.is_zero()).then(|| {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        if let Some(interval) = interval.as_mut() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
        } else if token.is_cancelled() {
            break;
        }

        refreshing.store(true, Ordering::SeqCst);
        let previous = tx.borrow().clone();
        let next = monitor.refresh(&previous, target.as_ref()).await;
        refreshing.store(false, Ordering::SeqCst);

        if token.is_cancelled() {
            debug!("Monitor cancelled during refresh, discarding results");
            break;
        }
        tx.send_replace(next);

        if interval.is_none() {
            break;
        }
    }

    debug!("Analytics polling stopped");
}

/// Handle to a running monitor
pub struct MonitorHandle {
    snapshot: watch::Receiver<Snapshot>,
    refreshing: Arc<AtomicBool>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified after every applied refresh.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Stop polling. An in-flight refresh finishes but is not applied.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the polling task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Polling task ended abnormally: {}", e);
            }
        }
    }

    /// Wait for the polling task to finish on its own (zero interval).
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
