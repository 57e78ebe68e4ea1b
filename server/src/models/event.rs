use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Ongoing,
    Completed,
}

/// An event with finite ticket capacity.
///
/// `capacity` is what is still bookable; `total_capacity` is what the event
/// was opened with. Their difference is always the quantity held by
/// purchased tickets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub total_capacity: i32,
    pub price: Decimal,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }

    pub fn sold(&self) -> i32 {
        self.total_capacity - self.capacity
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub price: Decimal,
    #[serde(default)]
    pub status: EventStatus,
}

/// Partial update: only the fields that are present are merged.
///
/// `capacity` here is the new total capacity; the remaining capacity moves by
/// the same delta.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub status: Option<EventStatus>,
}

/// Result of the guarded delete. Only `Deleted` removed the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    Started,
    HasTickets,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub name: Option<String>,
    pub status: Option<EventStatus>,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub min_capacity: Option<i32>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(name) = &self.name {
            if !event.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != event.status) {
            return false;
        }
        if self.starts_after.is_some_and(|after| event.start_date < after) {
            return false;
        }
        if self.starts_before.is_some_and(|before| event.start_date > before) {
            return false;
        }
        if self.min_capacity.is_some_and(|min| event.capacity < min) {
            return false;
        }
        true
    }
}
