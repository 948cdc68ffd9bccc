use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use circulate::application::dispatcher::NotificationDispatcher;
use circulate::application::expiry_monitor::ExpiryMonitor;
use circulate::application::loans::LoanLedger;
use circulate::application::locks::ResourceLocks;
use circulate::application::reservation_monitor::ReservationMonitor;
use circulate::application::reservations::ReservationQueue;
use circulate::application::service::CirculationService;
use circulate::config::CirculationConfig;
use circulate::domain::resource::{ResourceId, ResourceKind, ResourceRecord};
use circulate::domain::user::{User, UserId};
use circulate::infrastructure::channels::EmailChannel;
use circulate::infrastructure::in_memory::{InMemoryResourceDirectory, InMemoryUserDirectory};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str(&text).into_diagnostic()?
        }
        None => CirculationConfig::default(),
    };

    let resources = Arc::new(InMemoryResourceDirectory::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    seed(&resources, &users, &config).await;

    let locks = Arc::new(ResourceLocks::new());
    let queue = Arc::new(ReservationQueue::new(resources.clone(), locks.clone(), &config));
    let ledger = Arc::new(LoanLedger::new(resources.clone(), queue.clone(), locks));
    let channel = Arc::new(EmailChannel::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(users.clone(), channel));
    let service = CirculationService::new(ledger.clone(), queue.clone(), dispatcher.clone());

    let expiry_monitor = ExpiryMonitor::new(
        ledger.clone(),
        dispatcher.clone(),
        config.expiry_check_interval(),
        config.due_soon_window_days,
        config.monitor_stop_grace(),
    );
    let reservation_monitor = ReservationMonitor::new(
        queue.clone(),
        resources.clone(),
        dispatcher.clone(),
        config.reservation_check_interval(),
        config.monitor_stop_grace(),
    );
    expiry_monitor.start().await;
    reservation_monitor.start().await;

    // A short circulation day: borrow, contend, reserve, return, fulfill.
    let book = ResourceId::from("L001");
    let alice = UserId::from("U001");
    let ben = UserId::from("U002");

    let loan = service.borrow(&book, &alice).await.into_diagnostic()?;
    println!("{} borrowed {} (due {})", alice, book, loan.due_at.format("%Y-%m-%d"));

    match service.borrow(&book, &ben).await {
        Ok(_) => println!("{} borrowed {}", ben, book),
        Err(err) => println!("{} could not borrow {}: {}", ben, book, err),
    }

    let reservation = service.reserve(&book, &ben, 1).await.into_diagnostic()?;
    println!("{} reserved {} (reservation {})", ben, book, reservation.id);

    service.give_back(loan.id).await.into_diagnostic()?;
    println!("{} returned {}", alice, book);

    // Run a fulfillment pass right away instead of waiting out the
    // monitor interval.
    reservation_monitor.sweep(chrono::Utc::now()).await;

    let held_loan = service.borrow(&book, &ben).await.into_diagnostic()?;
    println!("{} claimed their reservation of {} (due {})", ben, book, held_loan.due_at.format("%Y-%m-%d"));

    let audiobook = ResourceId::from("A001");
    let audio_loan = service.borrow(&audiobook, &alice).await.into_diagnostic()?;
    let new_due = service.renew(audio_loan.id, 7).await.into_diagnostic()?;
    println!("{} renewed {} until {}", alice, audiobook, new_due.format("%Y-%m-%d"));

    // Let the dispatcher drain before the summary.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    println!("\nloan summary");
    for loan in service.ledger().all_loans().await {
        println!(
            "  {}  {} -> {}  due {}  {}",
            loan.id,
            loan.resource_id,
            loan.user_id,
            loan.due_at.format("%Y-%m-%d"),
            if loan.active { "active" } else { "returned" },
        );
    }
    println!("active reservations: {}", service.reservations().active_reservations().await.len());
    for (resource_id, count) in service.ledger().most_borrowed(3).await {
        println!("  most borrowed: {} ({} loans)", resource_id, count);
    }

    expiry_monitor.stop().await;
    reservation_monitor.stop().await;
    dispatcher.shutdown(config.dispatcher_grace()).await;

    Ok(())
}

async fn seed(
    resources: &InMemoryResourceDirectory,
    users: &InMemoryUserDirectory,
    config: &CirculationConfig,
) {
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
}
