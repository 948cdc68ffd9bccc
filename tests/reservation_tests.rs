mod common;

use circulate::application::service::CirculationService;
use circulate::domain::ports::ResourceDirectory;
use circulate::domain::resource::{ResourceId, ResourceState};
use circulate::domain::user::UserId;
use circulate::error::CirculationError;

#[tokio::test]
async fn test_priority_beats_arrival_order() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    let low = world
        .queue
        .reserve(&book, &UserId::from("U002"), 1)
        .await
        .unwrap();
    let high = world
        .queue
        .reserve(&book, &UserId::from("U003"), 2)
        .await
        .unwrap();
    assert!(low.requested_at < high.requested_at);

    assert_eq!(world.queue.head_of(&book).await.unwrap().id, high.id);
}

#[tokio::test]
async fn test_equal_priority_served_oldest_first() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    let first = world
        .queue
        .reserve(&book, &UserId::from("U002"), 1)
        .await
        .unwrap();
    world
        .queue
        .reserve(&book, &UserId::from("U003"), 1)
        .await
        .unwrap();

    assert_eq!(world.queue.head_of(&book).await.unwrap().id, first.id);
}

#[tokio::test]
async fn test_cancellation_scenario() {
    let world = common::world().await;
    let book = ResourceId::from("L002");
    world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    // Third party reserved with higher priority before U2 cancels.
    let high = world
        .queue
        .reserve(&book, &UserId::from("U003"), 2)
        .await
        .unwrap();
    let low = world
        .queue
        .reserve(&book, &UserId::from("U002"), 1)
        .await
        .unwrap();

    assert!(world.queue.cancel(low.id).await.unwrap());
    assert_eq!(world.queue.head_of(&book).await.unwrap().id, high.id);

    // Once the queue empties while the resource sits Reserved, it frees.
    world.ledger.return_loan(
        world.ledger.all_loans().await[0].id,
    )
    .await
    .unwrap();
    world.queue.claim_next(&book).await.unwrap().unwrap();
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Reserved
    );
}

#[tokio::test]
async fn test_cancel_empty_queue_frees_reserved_resource() {
    let world = common::world().await;
    let book = ResourceId::from("L001");

    let reservation = world
        .queue
        .reserve(&book, &UserId::from("U002"), 1)
        .await
        .unwrap();
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Reserved
    );

    world.queue.cancel(reservation.id).await.unwrap();
    assert_eq!(
        world.resources.find(&book).await.unwrap().unwrap().state,
        ResourceState::Available
    );
}

#[tokio::test]
async fn test_cancel_unknown_reservation() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    let reservation = world
        .queue
        .reserve(&book, &UserId::from("U002"), 1)
        .await
        .unwrap();
    world.queue.cancel(reservation.id).await.unwrap();

    // A second cancel is a no-op; an unknown id is an error.
    assert!(!world.queue.cancel(reservation.id).await.unwrap());
    let unknown = world
        .queue
        .reserve(&ResourceId::from("L002"), &UserId::from("U002"), 1)
        .await
        .unwrap()
        .id;
    world.queue.cancel(unknown).await.unwrap();
    assert!(!world.queue.cancel(unknown).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_reservations_are_allowed() {
    let world = common::world().await;
    let book = ResourceId::from("L001");
    let ben = UserId::from("U002");
    world
        .ledger
        .grant_loan(&book, &UserId::from("U001"))
        .await
        .unwrap();

    world.queue.reserve(&book, &ben, 1).await.unwrap();
    world.queue.reserve(&book, &ben, 1).await.unwrap();

    assert_eq!(world.queue.active_reservations_for(&book).await.len(), 2);
    assert_eq!(world.queue.reservations_for_user(&ben).await.len(), 2);
}

#[tokio::test]
async fn test_reserve_and_cancel_notify_the_user() {
    let world = common::world().await;
    let service = CirculationService::new(
        world.ledger.clone(),
        world.queue.clone(),
        world.dispatcher.clone(),
    );
    let ben = UserId::from("U002");

    let reservation = service
        .reserve(&ResourceId::from("L001"), &ben, 1)
        .await
        .unwrap();
    service.cancel_reservation(reservation.id).await.unwrap();

    world.channel.wait_for(2).await;
    let sent = world.channel.sent().await;
    assert!(sent[0].body.contains("reservation of L001 is registered"));
    assert!(sent[1].body.contains("was cancelled"));
}

#[tokio::test]
async fn test_reserve_unknown_resource_is_an_error() {
    let world = common::world().await;
    let err = world
        .queue
        .reserve(&ResourceId::from("L999"), &UserId::from("U002"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::ResourceNotFound(_)));
}
