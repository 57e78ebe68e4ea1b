use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// `Purchased -> Cancelled` is the only legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
pub enum TicketStatus {
    Purchased,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub price: Decimal,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// Fields of a purchased ticket that may change without touching capacity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub event_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<TicketStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.event_id.map_or(true, |id| ticket.event_id == id)
            && self.user_id.map_or(true, |id| ticket.user_id == id)
            && self.status.map_or(true, |status| ticket.status == status)
            && self
                .created_after
                .map_or(true, |after| ticket.created_at >= after)
            && self
                .created_before
                .map_or(true, |before| ticket.created_at <= before)
    }
}

/// Result of the atomic cancel primitive.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Ticket),
    NotPurchased,
    EventMissing,
}

/// Aggregate over purchased tickets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesTotals {
    pub total_tickets_sold: i64,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
}
