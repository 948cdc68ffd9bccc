use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::dispatcher::{NotificationDispatcher, NotificationTask};
use super::loans::LoanLedger;
use crate::domain::loan::Loan;

struct Running {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic watcher over the loan ledger.
///
/// Each pass sends an urgent notification per overdue loan and a reminder
/// per loan falling due inside the configured window. Two states:
/// stopped (initial) and running. Runs never overlap; each tick completes
/// before the next is polled.
pub struct ExpiryMonitor {
    ledger: Arc<LoanLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    due_soon_days: i64,
    stop_grace: Duration,
    running: Mutex<Option<Running>>,
}

impl ExpiryMonitor {
    pub fn new(
        ledger: Arc<LoanLedger>,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
        due_soon_days: i64,
        stop_grace: Duration,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            interval,
            due_soon_days,
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
        let ledger = Arc::clone(&self.ledger);
        let dispatcher = Arc::clone(&self.dispatcher);
        let interval = self.interval;
        let due_soon_days = self.due_soon_days;
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        run_sweep(&ledger, &dispatcher, due_soon_days, Utc::now()).await;
                    }
                }
            }
        });

        *running = Some(Running { stop_tx, task });
        info!(interval_secs = self.interval.as_secs(), "expiry monitor started");
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
            warn!("expiry monitor stop grace expired, sweep abandoned");
        }
        info!("expiry monitor stopped");
    }

    /// One sweep of the ledger as of `now`. Public so tests and callers
    /// can trigger a pass at a chosen instant.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        run_sweep(&self.ledger, &self.dispatcher, self.due_soon_days, now).await;
    }
}

async fn run_sweep(
    ledger: &LoanLedger,
    dispatcher: &NotificationDispatcher,
    due_soon_days: i64,
    now: DateTime<Utc>,
) {
    let overdue = ledger.loans_overdue(now).await;
    for loan in &overdue {
        dispatcher.enqueue(NotificationTask::alert(
            loan.user_id.clone(),
            format!(
                "Your loan of {} was due on {}. Please return it as soon as possible.",
                loan.resource_id,
                loan.due_at.format("%Y-%m-%d"),
            ),
        ));
    }

    let due_soon = ledger.loans_due_within(due_soon_days, now).await;
    for loan in &due_soon {
        dispatcher.enqueue(NotificationTask::notice(
            loan.user_id.clone(),
            reminder_body(loan, now),
        ));
    }

    info!(
        overdue = overdue.len(),
        due_soon = due_soon.len(),
        "expiry sweep complete"
    );
}

fn reminder_body(loan: &Loan, now: DateTime<Utc>) -> String {
    let days_left = (loan.due_at - now).num_days();
    match days_left {
        0 => format!("Your loan of {} is due today.", loan.resource_id),
        1 => format!("Your loan of {} is due tomorrow.", loan.resource_id),
        n => format!(
            "Your loan of {} is due in {} days, on {}.",
            loan.resource_id,
            n,
            loan.due_at.format("%Y-%m-%d"),
        ),
    }
}
