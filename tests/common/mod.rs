use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use circulate::application::dispatcher::NotificationDispatcher;
use circulate::application::loans::LoanLedger;
use circulate::application::locks::ResourceLocks;
use circulate::application::reservations::ReservationQueue;
use circulate::config::CirculationConfig;
use circulate::domain::ports::NotificationChannel;
use circulate::domain::resource::{ResourceKind, ResourceRecord};
use circulate::domain::user::{User, UserId};
use circulate::error::{CirculationError, Result};
use circulate::infrastructure::in_memory::{InMemoryResourceDirectory, InMemoryUserDirectory};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub user_id: UserId,
    pub body: String,
    pub urgent: bool,
}

/// Channel that records every delivery; flip `failing` to make it error.
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<SentMessage>>,
    pub failing: AtomicBool,
}

impl RecordingChannel {
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.messages.lock().await.clone()
    }

    /// Waits until at least `n` messages were delivered.
    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.messages.lock().await.len() >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected notifications were never delivered");
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, user: &User, message: &str, urgent: bool) -> Result<bool> {
        if self.failing.load(Ordering::Acquire) {
            return Err(CirculationError::ChannelError("wire down".into()));
        }
        self.messages.lock().await.push(SentMessage {
            user_id: user.id.clone(),
            body: message.to_string(),
            urgent,
        });
        Ok(true)
    }
}

/// Fully wired engine over in-memory collaborators.
pub struct World {
    pub config: CirculationConfig,
    pub resources: Arc<InMemoryResourceDirectory>,
    pub users: Arc<InMemoryUserDirectory>,
    pub queue: Arc<ReservationQueue>,
    pub ledger: Arc<LoanLedger>,
    pub channel: Arc<RecordingChannel>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

pub async fn world() -> World {
    let config = CirculationConfig::default();
    let resources = Arc::new(InMemoryResourceDirectory::new());
    let users = Arc::new(InMemoryUserDirectory::new());

    for (id, title, author, kind) in [
        ("L001", "The Name of the Wind", "Patrick Rothfuss", ResourceKind::Book),
        ("L002", "A Memory Called Empire", "Arkady Martine", ResourceKind::Book),
        ("M001", "Scientific American, May", "Various", ResourceKind::Magazine),
        ("A001", "Project Hail Mary", "Andy Weir", ResourceKind::Audiobook),
    ] {
        resources
            .add(ResourceRecord::new(id, title, author, kind, config.policy_for(kind)))
            .await;
    }
    users.add(User::new("U001", "Alice Chen", "alice@example.com")).await;
    users
        .add(User::new("U002", "Ben Ortiz", "ben@example.com").with_phone("555-0102"))
        .await;
    users.add(User::new("U003", "Chioma Eze", "chioma@example.com")).await;

    let locks = Arc::new(ResourceLocks::new());
    let queue = Arc::new(ReservationQueue::new(resources.clone(), locks.clone(), &config));
    let ledger = Arc::new(LoanLedger::new(resources.clone(), queue.clone(), locks));
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(users.clone(), channel.clone()));

    World {
        config,
        resources,
        users,
        queue,
        ledger,
        channel,
        dispatcher,
    }
}
