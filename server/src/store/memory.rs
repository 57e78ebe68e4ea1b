use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{EventStore, RevocationStore, TicketStore, UserStore};
use crate::models::{
    CancelOutcome, DeleteOutcome, Event, EventFilter, EventUpdate, NewEvent, NewTicket, NewUser, Page,
    RevokedToken, Role, SalesTotals, Ticket, TicketFilter, TicketStatus, TicketUpdate, User,
};
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    events: HashMap<i64, Event>,
    tickets: HashMap<i64, Ticket>,
    users: HashMap<i64, User>,
    revoked: HashMap<String, RevokedToken>,
    next_event_id: i64,
    next_ticket_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// Process-local store. One lock guards every table, so each trait call is
/// serialized against all others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page_of<T: Clone>(mut rows: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let start = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let items = if start >= rows.len() {
        Vec::new()
    } else {
        rows.drain(start..)
            .take(page.size as usize)
            .collect()
    };
    (items, total)
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(&self, event: NewEvent) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.events.values().any(|e| e.name == event.name) {
            return Err(AppError::Conflict("event name must be unique".to_string()));
        }

        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_event_id);
        let event = Event {
            id,
            name: event.name,
            description: event.description,
            start_date: event.start_date,
            end_date: event.end_date,
            capacity: event.capacity,
            total_capacity: event.capacity,
            price: event.price,
            status: event.status,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn find(&self, id: i64) -> Result<Option<Event>, AppError> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn list(&self, filter: &EventFilter, page: Page) -> Result<(Vec<Event>, i64), AppError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Event> = tables
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(page_of(rows, page))
    }

    async fn update(&self, id: i64, update: EventUpdate) -> Result<Option<Event>, AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(name) = &update.name {
            if tables.events.values().any(|e| e.id != id && &e.name == name) {
                return Err(AppError::Conflict("event name must be unique".to_string()));
            }
        }

        let Some(event) = tables.events.get_mut(&id) else {
            return Err(AppError::NotFound(format!("event {id} not found")));
        };

        if let Some(total) = update.capacity {
            let remaining = event.capacity + (total - event.total_capacity);
            if remaining < 0 {
                return Ok(None);
            }
            event.capacity = remaining;
            event.total_capacity = total;
        }
        if let Some(name) = update.name {
            event.name = name;
        }
        if let Some(description) = update.description {
            event.description = description;
        }
        if let Some(start_date) = update.start_date {
            event.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            event.end_date = end_date;
        }
        if let Some(price) = update.price {
            event.price = price;
        }
        if let Some(status) = update.status {
            event.status = status;
        }
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> Result<DeleteOutcome, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(event) = tables.events.get(&id) else {
            return Ok(DeleteOutcome::Missing);
        };
        if event.has_started(now) {
            return Ok(DeleteOutcome::Started);
        }
        if tables.tickets.values().any(|t| t.event_id == id) {
            return Ok(DeleteOutcome::HasTickets);
        }
        tables.events.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn is_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, AppError> {
        let tables = self.tables.lock().await;
        Ok(!tables
            .events
            .values()
            .any(|e| e.name == name && Some(e.id) != exclude_id))
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn issue_ticket(&self, ticket: NewTicket) -> Result<Option<Ticket>, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(event) = tables.events.get_mut(&ticket.event_id) else {
            return Err(AppError::NotFound(format!(
                "event {} not found",
                ticket.event_id
            )));
        };
        if event.capacity < ticket.quantity {
            return Ok(None);
        }
        let now = Utc::now();
        event.capacity -= ticket.quantity;
        event.updated_at = now;

        let id = Tables::next_id(&mut tables.next_ticket_id);
        let ticket = Ticket {
            id,
            event_id: ticket.event_id,
            user_id: ticket.user_id,
            quantity: ticket.quantity,
            price: ticket.price,
            status: TicketStatus::Purchased,
            created_at: now,
            updated_at: now,
        };
        tables.tickets.insert(id, ticket.clone());
        Ok(Some(ticket))
    }

    async fn cancel_ticket(&self, id: i64) -> Result<CancelOutcome, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(ticket) = tables.tickets.get(&id).cloned() else {
            return Err(AppError::NotFound(format!("ticket {id} not found")));
        };
        if ticket.status != TicketStatus::Purchased {
            return Ok(CancelOutcome::NotPurchased);
        }
        let now = Utc::now();
        let Some(event) = tables.events.get_mut(&ticket.event_id) else {
            return Ok(CancelOutcome::EventMissing);
        };
        event.capacity += ticket.quantity;
        event.updated_at = now;

        let Some(stored) = tables.tickets.get_mut(&id) else {
            return Err(AppError::NotFound(format!("ticket {id} not found")));
        };
        stored.status = TicketStatus::Cancelled;
        stored.updated_at = now;
        Ok(CancelOutcome::Cancelled(stored.clone()))
    }

    async fn find(&self, id: i64) -> Result<Option<Ticket>, AppError> {
        Ok(self.tables.lock().await.tickets.get(&id).cloned())
    }

    async fn update_purchased(
        &self,
        id: i64,
        update: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError> {
        let mut tables = self.tables.lock().await;
        match tables.tickets.get_mut(&id) {
            Some(ticket) if ticket.status == TicketStatus::Purchased => {
                if let Some(user_id) = update.user_id {
                    ticket.user_id = user_id;
                }
                ticket.updated_at = Utc::now();
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<(Vec<Ticket>, i64), AppError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Ticket> = tables
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(page_of(rows, page))
    }

    async fn any_for_event(&self, event_id: i64) -> Result<bool, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.tickets.values().any(|t| t.event_id == event_id))
    }

    async fn sales_totals(&self, event_id: Option<i64>) -> Result<SalesTotals, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .values()
            .filter(|t| t.status == TicketStatus::Purchased)
            .filter(|t| event_id.map_or(true, |id| t.event_id == id))
            .fold(SalesTotals::default(), |mut acc, t| {
                acc.total_tickets_sold += 1;
                acc.total_quantity += i64::from(t.quantity);
                acc.total_revenue += t.price;
                acc
            }))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("username is already taken".to_string()));
        }
        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_user_id);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl RevocationStore for MemoryStore {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        tables
            .revoked
            .entry(token.to_string())
            .or_insert_with(|| RevokedToken {
                token: token.to_string(),
                expires_at,
            });
        Ok(())
    }

    async fn is_revoked(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .revoked
            .get(token)
            .is_some_and(|entry| entry.is_live(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn new_event(name: &str, capacity: i32) -> NewEvent {
        let start = Utc::now() + Duration::days(7);
        NewEvent {
            name: name.to_string(),
            description: String::new(),
            start_date: start,
            end_date: start + Duration::hours(3),
            capacity,
            price: Decimal::new(2500, 2),
            status: EventStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_issue_ticket_refuses_when_capacity_short() {
        let store = MemoryStore::new();
        let event = EventStore::insert(&store, new_event("Gig", 2)).await.unwrap();

        let ticket = NewTicket {
            event_id: event.id,
            user_id: 1,
            quantity: 3,
            price: Decimal::ZERO,
        };
        assert!(store.issue_ticket(ticket).await.unwrap().is_none());

        let stored = EventStore::find(&store, event.id).await.unwrap().unwrap();
        assert_eq!(stored.capacity, 2);
    }

    #[tokio::test]
    async fn test_capacity_update_keeps_sold_quantity() {
        let store = MemoryStore::new();
        let event = EventStore::insert(&store, new_event("Fair", 10)).await.unwrap();
        store
            .issue_ticket(NewTicket {
                event_id: event.id,
                user_id: 1,
                quantity: 4,
                price: Decimal::ZERO,
            })
            .await
            .unwrap()
            .unwrap();

        let grown = EventStore::update(
            &store,
            event.id,
            EventUpdate {
                capacity: Some(20),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(grown.total_capacity, 20);
        assert_eq!(grown.capacity, 16);

        let shrunk = EventStore::update(
            &store,
            event.id,
            EventUpdate {
                capacity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(shrunk.is_none());
    }

    #[tokio::test]
    async fn test_delete_checks_tickets_and_start_under_the_lock() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let sold = EventStore::insert(&store, new_event("Sold", 5)).await.unwrap();
        let free = EventStore::insert(&store, new_event("Free", 5)).await.unwrap();
        store
            .issue_ticket(NewTicket {
                event_id: sold.id,
                user_id: 1,
                quantity: 1,
                price: Decimal::ZERO,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            EventStore::delete(&store, sold.id, now).await.unwrap(),
            DeleteOutcome::HasTickets
        );
        assert_eq!(
            EventStore::delete(&store, free.id, free.start_date).await.unwrap(),
            DeleteOutcome::Started
        );
        assert_eq!(
            EventStore::delete(&store, free.id, now).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            EventStore::delete(&store, free.id, now).await.unwrap(),
            DeleteOutcome::Missing
        );
        assert!(EventStore::find(&store, sold.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_paging_past_the_end_is_empty() {
        let store = MemoryStore::new();
        for i in 0..3 {
            EventStore::insert(&store, new_event(&format!("E{i}"), 1))
                .await
                .unwrap();
        }
        let (items, total) = EventStore::list(&store, &EventFilter::default(), Page::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);

        let (items, total) = EventStore::list(&store, &EventFilter::default(), Page::new(5, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_expired_revocation_no_longer_counts() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.revoke("abc", now + Duration::minutes(5)).await.unwrap();
        assert!(store.is_revoked("abc", now).await.unwrap());
        assert!(!store
            .is_revoked("abc", now + Duration::minutes(6))
            .await
            .unwrap());
        assert!(!store.is_revoked("other", now).await.unwrap());
    }
}
