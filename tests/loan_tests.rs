mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use circulate::application::service::CirculationService;
use circulate::domain::ports::ResourceDirectory;
use circulate::domain::resource::{ResourceId, ResourceState};
use circulate::domain::user::UserId;
use circulate::error::CirculationError;

#[tokio::test]
async fn test_grant_return_grant_round_trip() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    let alice = UserId::from("U001");

    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Available
    );

    let first = world.ledger.grant_loan(&book, &alice).await.unwrap();
    assert!(world.ledger.return_loan(first.id).await.unwrap());
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Available
    );

    let second = world.ledger.grant_loan(&book, &alice).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(world.ledger.all_loans().await.len(), 2);
}

#[tokio::test]
async fn test_return_is_idempotent() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    let loan = world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    assert!(world.ledger.return_loan(loan.id).await.unwrap());
    assert!(!world.ledger.return_loan(loan.id).await.unwrap());
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Available
    );
}

#[tokio::test]
async fn test_loaned_resource_rejects_second_borrower() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    let err = world
        .ledger
        .grant_loan(&book, &UserId::from("U002"))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::ResourceUnavailable { .. }));
}

#[tokio::test]
async fn test_magazine_is_never_renewable() {
    let world = common::world().await;
    let loan = world
        .ledger
        .grant_loan(&ResourceId::from("M001"), &UserId::from("U001"))
        .await
        .unwrap();

    let err = world.ledger.renew_loan(loan.id, 7).await.unwrap_err();
    assert!(matches!(err, CirculationError::NotRenewable { .. }));
}

#[tokio::test]
async fn test_reserved_resource_only_loans_to_claimant() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    let ben = UserId::from("U002");

    // Reserving an available resource parks it in Reserved.
    world.queue.reserve(&book, &ben, 1).await.unwrap();
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Reserved
    );

    let err = world
        .ledger
        .grant_loan(&book, &UserId::from("U003"))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::ResourceUnavailable { .. }));

    // The claimant gets through, and their reservation is consumed.
    let loan = world.ledger.grant_loan(&book, &ben).await.unwrap();
    assert!(loan.active);
    assert!(world.queue.head_of(&book).await.is_none());
    assert!(world.queue.active_reservations().await.is_empty());
}

#[tokio::test]
async fn test_single_active_loan_invariant_under_concurrency() {
    let world = common::world().await;
    let book = ResourceId::from("L001");

    let mut handles = Vec::new();
    for task in 0..8u64 {
        let ledger = Arc::clone(&world.ledger);
        let book = book.clone();
        handles.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(task);
            let user = UserId::from(format!("U{:03}", task + 1));
            let mut granted = 0u32;
            for _ in 0..40 {
                match ledger.grant_loan(&book, &user).await {
                    Ok(loan) => {
                        granted += 1;
                        if rng.gen_bool(0.5) {
                            tokio::task::yield_now().await;
                        }
                        assert!(ledger.return_loan(loan.id).await.unwrap());
                    }
                    Err(CirculationError::ResourceUnavailable { .. }) => {
                        tokio::task::yield_now().await;
                    }
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            granted
        }));
    }

    // Observe the invariant while the writers hammer the ledger.
    let observer = {
        let ledger = Arc::clone(&world.ledger);
        let book = book.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let active = ledger
                    .all_loans()
                    .await
                    .into_iter()
                    .filter(|loan| loan.active && loan.resource_id == book)
                    .count();
                assert!(active <= 1, "observed {active} concurrent active loans");
                tokio::task::yield_now().await;
            }
        })
    };

    let mut total_granted = 0;
    for handle in handles {
        total_granted += handle.await.unwrap();
    }
    observer.await.unwrap();

    assert_eq!(world.ledger.all_loans().await.len() as u32, total_granted);
    assert!(
        world
            .ledger
            .all_loans()
            .await
            .iter()
            .all(|loan| !loan.active)
    );
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Available
    );
}

#[tokio::test]
async fn test_borrow_and_return_notify_the_user() {
    let world = common::world().await;
    let service = CirculationService::new(
        world.ledger.clone(),
        world.queue.clone(),
        world.dispatcher.clone(),
    );
    let alice = UserId::from("U001");

    let loan = service.borrow(&ResourceId::from("L001"), &alice).await.unwrap();
    service.give_back(loan.id).await.unwrap();

    world.channel.wait_for(2).await;
    let sent = world.channel.sent().await;
    assert!(sent[0].body.contains("You borrowed L001"));
    assert!(!sent[0].urgent);
    assert!(sent[1].body.contains("return of L001"));
    assert!(sent.iter().all(|message| message.user_id == alice));
}
