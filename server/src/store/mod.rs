//! Persistence collaborators.
//!
//! The services only talk to these traits. [`PgStore`] is the production
//! backend; [`MemoryStore`] keeps everything in process and backs the tests.
//! Both must honour the atomicity of [`TicketStore::issue_ticket`],
//! [`TicketStore::cancel_ticket`] and [`EventStore::update`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    CancelOutcome, DeleteOutcome, Event, EventFilter, EventUpdate, NewEvent, NewTicket, NewUser, Page, Role,
    SalesTotals, Ticket, TicketFilter, TicketUpdate, User,
};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts with `capacity == total_capacity`. Duplicate names are `Conflict`.
    async fn insert(&self, event: NewEvent) -> Result<Event, AppError>;

    async fn find(&self, id: i64) -> Result<Option<Event>, AppError>;

    async fn list(&self, filter: &EventFilter, page: Page) -> Result<(Vec<Event>, i64), AppError>;

    /// Merges the present fields. A capacity change moves `capacity` by the
    /// same delta as `total_capacity` in one step; returns `Ok(None)` when the
    /// new total would drop below what is already sold.
    async fn update(&self, id: i64, update: EventUpdate) -> Result<Option<Event>, AppError>;

    /// Removes the event only if it has not started by `now` and no ticket
    /// was ever issued for it, checked and applied as one step.
    async fn delete(&self, id: i64, now: DateTime<Utc>) -> Result<DeleteOutcome, AppError>;

    async fn is_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Takes `quantity` from the event's capacity and records a purchased
    /// ticket as one atomic unit. `Ok(None)` means the capacity was no longer
    /// there when the write happened.
    async fn issue_ticket(&self, ticket: NewTicket) -> Result<Option<Ticket>, AppError>;

    /// Flips a purchased ticket to cancelled and gives its quantity back to
    /// the event as one atomic unit.
    async fn cancel_ticket(&self, id: i64) -> Result<CancelOutcome, AppError>;

    async fn find(&self, id: i64) -> Result<Option<Ticket>, AppError>;

    /// Applies the update only while the ticket is still purchased.
    async fn update_purchased(
        &self,
        id: i64,
        update: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError>;

    async fn list(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<(Vec<Ticket>, i64), AppError>;

    /// Tickets are never removed, so any row means a purchase happened.
    async fn any_for_event(&self, event_id: i64) -> Result<bool, AppError>;

    /// Count, quantity and revenue over purchased tickets, optionally for one event.
    async fn sales_totals(&self, event_id: Option<i64>) -> Result<SalesTotals, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    async fn find(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoking an already revoked token is a no-op.
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError>;

    /// Only entries that have not expired at `now` count.
    async fn is_revoked(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}
