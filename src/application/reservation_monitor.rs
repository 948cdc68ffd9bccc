use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::dispatcher::{NotificationDispatcher, NotificationTask};
use super::reservations::ReservationQueue;
use crate::domain::ports::ResourceDirectoryRef;

struct Running {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic matcher between available resources and waiting reservations.
///
/// Each pass purges stale reservations and lapsed holds, then claims the
/// head reservation of every available resource, parking the resource in
/// `Reserved` for its claimant and notifying them. Fulfilling never
/// creates a loan; the claimant still has to borrow the resource
/// themselves. Same stopped/running lifecycle as the expiry monitor.
pub struct ReservationMonitor {
    queue: Arc<ReservationQueue>,
    resources: ResourceDirectoryRef,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    stop_grace: Duration,
    running: Mutex<Option<Running>>,
}

impl ReservationMonitor {
    pub fn new(
        queue: Arc<ReservationQueue>,
        resources: ResourceDirectoryRef,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
        stop_grace: Duration,
    ) -> Self {
        Self {
            queue,
            resources,
            dispatcher,
            interval,
            stop_grace,
            running: Mutex::new(None),
        }
    }

    /// Schedules repeating sweeps, one interval apart. No-op when
    /// already running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let queue = Arc::clone(&self.queue);
        let resources = Arc::clone(&self.resources);
        let dispatcher = Arc::clone(&self.dispatcher);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        run_sweep(&queue, &resources, &dispatcher, Utc::now()).await;
                    }
                }
            }
        });

        *running = Some(Running { stop_tx, task });
        info!(interval_secs = self.interval.as_secs(), "reservation monitor started");
    }

    /// Cancels future sweeps and waits up to the configured grace for an
    /// in-flight sweep before aborting it. No-op when already stopped.
    pub async fn stop(&self) {
        let Some(Running { stop_tx, mut task }) = self.running.lock().await.take() else {
            return;
        };
        let _ = stop_tx.send(true);
        if tokio::time::timeout(self.stop_grace, &mut task).await.is_err() {
            task.abort();
            warn!("reservation monitor stop grace expired, sweep abandoned");
        }
        info!("reservation monitor stopped");
    }

    /// One sweep as of `now`. Public so tests and callers can trigger a
    /// pass at a chosen instant.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        run_sweep(&self.queue, &self.resources, &self.dispatcher, now).await;
    }
}

/// A failure on one resource never stops the rest of the pass.
async fn run_sweep(
    queue: &ReservationQueue,
    resources: &ResourceDirectoryRef,
    dispatcher: &NotificationDispatcher,
    now: DateTime<Utc>,
) {
    let purged = queue.purge_expired(now).await;
    if purged > 0 {
        info!(purged, "expired reservations purged");
    }
    let lapsed = queue.purge_expired_holds(now).await;
    if lapsed > 0 {
        info!(lapsed, "stale holds released");
    }

    let available = match resources.list_available().await {
        Ok(records) => records,
        Err(error) => {
            warn!(%error, "could not list available resources, skipping sweep");
            return;
        }
    };

    let mut fulfilled = 0;
    for record in available {
        match queue.claim_next(&record.id).await {
            Ok(Some(reservation)) => {
                dispatcher.enqueue(NotificationTask::alert(
                    reservation.user_id.clone(),
                    format!(
                        "{} ({}) is now available and held for you. Borrow it before the hold lapses.",
                        record.title, record.id,
                    ),
                ));
                fulfilled += 1;
            }
            Ok(None) => {}
            Err(error) => {
                warn!(resource = %record.id, %error, "reservation claim failed");
            }
        }
    }

    let remaining = queue.active_reservations().await.len();
    info!(fulfilled, remaining, "reservation sweep complete");
}
