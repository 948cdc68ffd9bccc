use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::ports::{NotificationChannelRef, UserDirectoryRef};
use crate::domain::user::UserId;

/// One queued notification. Ephemeral: created, enqueued, consumed once.
#[derive(Debug, Clone)]
pub struct NotificationTask {
    pub user_id: UserId,
    pub body: String,
    pub urgent: bool,
}

impl NotificationTask {
    pub fn notice(user_id: UserId, body: impl Into<String>) -> Self {
        Self {
            user_id,
            body: body.into(),
            urgent: false,
        }
    }

    pub fn alert(user_id: UserId, body: impl Into<String>) -> Self {
        Self {
            user_id,
            body: body.into(),
            urgent: true,
        }
    }
}

/// Asynchronous best-effort notification pipeline.
///
/// A FIFO queue with a single consumer task, decoupling "an event
/// happened" from "a message was sent". Two contracts are load-bearing:
/// `enqueue` never fails the caller's business operation, and a delivery
/// failure never reaches the operation that triggered it. Delivery is
/// at-most-once with no retry.
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<NotificationTask>,
    stop_tx: watch::Sender<bool>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    accepting: AtomicBool,
}

impl NotificationDispatcher {
    /// Spawns the consumer task; must be called inside a tokio runtime.
    pub fn new(users: UserDirectoryRef, channel: NotificationChannelRef) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationTask>();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let consumer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    task = rx.recv() => match task {
                        Some(task) => deliver(&users, &channel, task).await,
                        None => break,
                    },
                }
            }
        });

        Self {
            tx,
            stop_tx,
            consumer: Mutex::new(Some(consumer)),
            accepting: AtomicBool::new(true),
        }
    }

    /// Queues a notification without blocking. Infallible from the
    /// caller's perspective: after shutdown the task is logged and
    /// dropped, never an error.
    pub fn enqueue(&self, task: NotificationTask) {
        if !self.accepting.load(Ordering::Acquire) {
            warn!(user = %task.user_id, "dispatcher shut down, notification dropped");
            return;
        }
        if self.tx.send(task).is_err() {
            warn!("notification queue closed, task dropped");
        }
    }

    /// Stops accepting work, then waits up to `grace` for the consumer
    /// to finish its current delivery before aborting it. Tasks still
    /// queued when the grace period expires are dropped.
    pub async fn shutdown(&self, grace: Duration) {
        self.accepting.store(false, Ordering::Release);
        let Some(mut consumer) = self.consumer.lock().await.take() else {
            return;
        };
        let _ = self.stop_tx.send(true);
        if tokio::time::timeout(grace, &mut consumer).await.is_err() {
            consumer.abort();
            warn!("dispatcher grace period expired, in-flight delivery abandoned");
        }
        info!("notification dispatcher stopped");
    }
}

async fn deliver(users: &UserDirectoryRef, channel: &NotificationChannelRef, task: NotificationTask) {
    let user = match users.find(&task.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user = %task.user_id, "notification recipient unknown, dropped");
            return;
        }
        Err(error) => {
            warn!(user = %task.user_id, %error, "recipient lookup failed, notification dropped");
            return;
        }
    };

    match channel.send(&user, &task.body, task.urgent).await {
        Ok(true) => debug!(user = %user.id, urgent = task.urgent, "notification delivered"),
        Ok(false) => warn!(user = %user.id, "notification channel declined delivery"),
        Err(error) => warn!(user = %user.id, %error, "notification delivery failed"),
    }
}
