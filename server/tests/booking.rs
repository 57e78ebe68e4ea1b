//! Booking engine behaviour over the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use common::{create_event, create_started_event, register, remaining, setup, upcoming_event};
use eventix_server::models::{
    DeleteOutcome, Event, EventFilter, EventUpdate, NewEvent, Page, Role, SalesTotals,
    TicketStatus, TicketUpdate,
};
use eventix_server::services::{BookingEngine, EventCatalog, UserDirectory};
use eventix_server::store::{EventStore, MemoryStore};
use eventix_server::utils::error::AppError;

/// Holds every delete for `delay` before handing it to the real store.
struct SlowDelete {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl EventStore for SlowDelete {
    async fn insert(&self, event: NewEvent) -> Result<Event, AppError> {
        EventStore::insert(&*self.inner, event).await
    }

    async fn find(&self, id: i64) -> Result<Option<Event>, AppError> {
        EventStore::find(&*self.inner, id).await
    }

    async fn list(&self, filter: &EventFilter, page: Page) -> Result<(Vec<Event>, i64), AppError> {
        EventStore::list(&*self.inner, filter, page).await
    }

    async fn update(&self, id: i64, update: EventUpdate) -> Result<Option<Event>, AppError> {
        EventStore::update(&*self.inner, id, update).await
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> Result<DeleteOutcome, AppError> {
        tokio::time::sleep(self.delay).await;
        EventStore::delete(&*self.inner, id, now).await
    }

    async fn is_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, AppError> {
        EventStore::is_name_unique(&*self.inner, name, exclude_id).await
    }
}

#[tokio::test]
async fn test_concurrent_bookings_never_oversell() {
    let (state, _store, _config) = setup();
    let user = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Stadium Night", 10).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let bookings = Arc::clone(&state.bookings);
        let event_id = event.id;
        let user_id = user.id;
        handles.push(tokio::spawn(async move {
            bookings.create_booking(event_id, user_id, 3).await
        }));
    }

    let mut succeeded = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(conflicts, 7);
    assert_eq!(remaining(&state, event.id).await, 1);
}

#[tokio::test]
async fn test_booking_takes_capacity_and_charges_quantity() {
    let (state, _store, _config) = setup();
    let user = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Jazz Evening", 20).await;

    let ticket = state
        .bookings
        .create_booking(event.id, user.id, 4)
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Purchased);
    assert_eq!(ticket.quantity, 4);
    assert_eq!(ticket.price, Decimal::new(10000, 2));
    assert_eq!(remaining(&state, event.id).await, 16);
}

#[tokio::test]
async fn test_booking_rejects_bad_requests() {
    let (state, _store, _config) = setup();
    let user = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Small Room", 2).await;

    let zero = state.bookings.create_booking(event.id, user.id, 0).await;
    assert!(matches!(zero, Err(AppError::ValidationError(_))));

    let too_many = state.bookings.create_booking(event.id, user.id, 3).await;
    assert!(matches!(too_many, Err(AppError::Conflict(_))));

    let missing = state.bookings.create_booking(9999, user.id, 1).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    assert_eq!(remaining(&state, event.id).await, 2);
}

#[tokio::test]
async fn test_cancel_restores_capacity_once() {
    let (state, _store, _config) = setup();
    let user = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Theatre", 20).await;

    let ticket = state
        .bookings
        .create_booking(event.id, user.id, 5)
        .await
        .unwrap();
    assert_eq!(remaining(&state, event.id).await, 15);

    let cancelled = state.bookings.cancel_booking(ticket.id).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert_eq!(remaining(&state, event.id).await, 20);

    let again = state.bookings.cancel_booking(ticket.id).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(remaining(&state, event.id).await, 20);
}

#[tokio::test]
async fn test_cancel_unknown_ticket_is_not_found() {
    let (state, _store, _config) = setup();
    let result = state.bookings.cancel_booking(42).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_transfer_moves_ticket_to_another_user() {
    let (state, _store, _config) = setup();
    let alice = register(&state, "alice", Role::User).await;
    let bob = register(&state, "bob", Role::User).await;
    let event = create_event(&state, "Opera", 10).await;
    let ticket = state
        .bookings
        .create_booking(event.id, alice.id, 2)
        .await
        .unwrap();

    let moved = state
        .bookings
        .update_booking(
            ticket.id,
            TicketUpdate {
                user_id: Some(bob.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.user_id, bob.id);
    assert_eq!(moved.quantity, 2);
    assert_eq!(remaining(&state, event.id).await, 8);

    let nobody = state
        .bookings
        .update_booking(
            ticket.id,
            TicketUpdate {
                user_id: Some(9999),
            },
        )
        .await;
    assert!(matches!(nobody, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_cancelled_ticket_cannot_be_updated() {
    let (state, _store, _config) = setup();
    let alice = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Ballet", 10).await;
    let ticket = state
        .bookings
        .create_booking(event.id, alice.id, 1)
        .await
        .unwrap();
    state.bookings.cancel_booking(ticket.id).await.unwrap();

    let result = state
        .bookings
        .update_booking(
            ticket.id,
            TicketUpdate {
                user_id: Some(alice.id),
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_started_event_is_locked() {
    let (state, store, _config) = setup();
    let event = create_started_event(&store, "Already On", 10).await;

    let update = state
        .catalog
        .update(
            event.id,
            EventUpdate {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(update, Err(AppError::Conflict(_))));

    let delete = state.catalog.delete(event.id).await;
    assert!(matches!(delete, Err(AppError::Conflict(_))));
    assert!(state.catalog.get(event.id).await.is_ok());
}

#[tokio::test]
async fn test_sold_event_cannot_be_deleted() {
    let (state, _store, _config) = setup();
    let alice = register(&state, "alice", Role::User).await;
    let sold = create_event(&state, "Sold", 10).await;
    let unsold = create_event(&state, "Unsold", 10).await;

    let ticket = state
        .bookings
        .create_booking(sold.id, alice.id, 1)
        .await
        .unwrap();
    state.bookings.cancel_booking(ticket.id).await.unwrap();

    let blocked = state.catalog.delete(sold.id).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    state.catalog.delete(unsold.id).await.unwrap();
    let gone = state.catalog.get(unsold.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_booking_during_delete_keeps_the_event() {
    let store = Arc::new(MemoryStore::new());
    let events: Arc<dyn EventStore> = Arc::new(SlowDelete {
        inner: store.clone(),
        delay: Duration::from_millis(50),
    });
    let bookings = Arc::new(BookingEngine::new(store.clone(), store.clone(), store.clone()));
    let catalog = Arc::new(EventCatalog::new(events, bookings.clone()));
    let user = UserDirectory::new(store.clone(), 4)
        .register("alice", "correct-horse", Role::User)
        .await
        .unwrap();
    let event = catalog.create(upcoming_event("Race", 10)).await.unwrap();

    let deleting = tokio::spawn({
        let catalog = catalog.clone();
        let event_id = event.id;
        async move { catalog.delete(event_id).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let ticket = bookings.create_booking(event.id, user.id, 2).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Purchased);

    let deleted = deleting.await.unwrap();
    assert!(matches!(deleted, Err(AppError::Conflict(_))));
    assert_eq!(catalog.get(event.id).await.unwrap().capacity, 8);

    let cancelled = bookings.cancel_booking(ticket.id).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert_eq!(catalog.get(event.id).await.unwrap().capacity, 10);
}

#[tokio::test]
async fn test_capacity_cannot_shrink_below_sold() {
    let (state, _store, _config) = setup();
    let alice = register(&state, "alice", Role::User).await;
    let event = create_event(&state, "Festival", 10).await;
    state
        .bookings
        .create_booking(event.id, alice.id, 6)
        .await
        .unwrap();

    let shrink = state
        .catalog
        .update(
            event.id,
            EventUpdate {
                capacity: Some(5),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(shrink, Err(AppError::Conflict(_))));

    let grown = state
        .catalog
        .update(
            event.id,
            EventUpdate {
                capacity: Some(12),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grown.total_capacity, 12);
    assert_eq!(grown.capacity, 6);
}

#[tokio::test]
async fn test_event_names_stay_unique() {
    let (state, _store, _config) = setup();
    let first = create_event(&state, "Expo", 10).await;
    let second = create_event(&state, "Fair", 10).await;

    let duplicate = state.catalog.create(upcoming_event("Expo", 5)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let rename = state
        .catalog
        .update(
            second.id,
            EventUpdate {
                name: Some("Expo".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(rename, Err(AppError::Conflict(_))));

    assert!(state.catalog.is_name_unique("Expo", Some(first.id)).await.unwrap());
    assert!(!state.catalog.is_name_unique("Expo", None).await.unwrap());
}

#[tokio::test]
async fn test_reports_count_only_purchased_tickets() {
    let (state, _store, _config) = setup();
    let alice = register(&state, "alice", Role::User).await;
    let concert = create_event(&state, "Concert", 50).await;
    let lecture = create_event(&state, "Lecture", 50).await;

    state
        .bookings
        .create_booking(concert.id, alice.id, 2)
        .await
        .unwrap();
    state
        .bookings
        .create_booking(lecture.id, alice.id, 3)
        .await
        .unwrap();
    let refunded = state
        .bookings
        .create_booking(concert.id, alice.id, 4)
        .await
        .unwrap();
    state.bookings.cancel_booking(refunded.id).await.unwrap();

    let summary = state.reports.summary(Page::new(1, 1)).await.unwrap();
    assert_eq!(summary.totals.total_tickets_sold, 2);
    assert_eq!(summary.totals.total_quantity, 5);
    assert_eq!(summary.totals.total_revenue, Decimal::new(12500, 2));
    assert_eq!(summary.tickets.items.len(), 1);
    assert_eq!(summary.tickets.total_items, 2);

    let per_event = state
        .reports
        .event_report(concert.id, Page::default())
        .await
        .unwrap();
    assert_eq!(per_event.event_id, Some(concert.id));
    assert_eq!(per_event.totals.total_tickets_sold, 1);
    assert_eq!(per_event.totals.total_quantity, 2);
    assert!(per_event
        .tickets
        .items
        .iter()
        .all(|t| t.status == TicketStatus::Purchased));

    let empty = state
        .reports
        .event_report(9999, Page::default())
        .await
        .unwrap();
    assert_eq!(empty.totals, SalesTotals::default());
    assert!(empty.tickets.items.is_empty());
}
