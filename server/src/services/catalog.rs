//! Event records and the rules that guard them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::models::{DeleteOutcome, Event, EventFilter, EventUpdate, NewEvent, Page, Paginated};
use crate::services::booking::BookingEngine;
use crate::store::EventStore;
use crate::utils::error::AppError;

pub struct EventCatalog {
    events: Arc<dyn EventStore>,
    bookings: Arc<BookingEngine>,
}

impl EventCatalog {
    /// Deletion asks `bookings` whether any ticket was sold.
    pub fn new(events: Arc<dyn EventStore>, bookings: Arc<BookingEngine>) -> Self {
        Self { events, bookings }
    }

    pub async fn create(&self, event: NewEvent) -> Result<Event, AppError> {
        validate_name(&event.name)?;
        validate_capacity(event.capacity)?;
        validate_price(event.price)?;
        validate_dates(event.start_date, event.end_date)?;
        self.ensure_name_unique(&event.name, None).await?;

        let event = self.events.insert(event).await?;
        info!(event_id = event.id, name = %event.name, capacity = event.capacity, "event created");
        Ok(event)
    }

    pub async fn get(&self, id: i64) -> Result<Event, AppError> {
        self.events
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {id} not found")))
    }

    pub async fn list(&self, filter: &EventFilter, page: Page) -> Result<Paginated<Event>, AppError> {
        let (events, total) = self.events.list(filter, page).await?;
        Ok(Paginated::new(events, total, page))
    }

    /// Merges the supplied fields into an event that has not started yet.
    pub async fn update(&self, id: i64, update: EventUpdate) -> Result<Event, AppError> {
        let existing = self.get(id).await?;
        if existing.has_started(Utc::now()) {
            return Err(AppError::Conflict(
                "event cannot be updated because it has already started".to_string(),
            ));
        }

        if let Some(name) = &update.name {
            validate_name(name)?;
            self.ensure_name_unique(name, Some(id)).await?;
        }
        if let Some(capacity) = update.capacity {
            validate_capacity(capacity)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        validate_dates(
            update.start_date.unwrap_or(existing.start_date),
            update.end_date.unwrap_or(existing.end_date),
        )?;

        let event = self.events.update(id, update).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "capacity cannot drop below the {} tickets already sold",
                existing.sold()
            ))
        })?;
        info!(event_id = id, "event updated");
        Ok(event)
    }

    /// The store re-checks both rules while removing the row, so a booking
    /// racing this call either blocks the delete or finds the event gone.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let existing = self.get(id).await?;
        if existing.has_started(Utc::now()) {
            return Err(started_delete());
        }
        self.bookings.can_delete_event(id).await?;

        match self.events.delete(id, Utc::now()).await? {
            DeleteOutcome::Deleted => {
                info!(event_id = id, "event deleted");
                Ok(())
            }
            DeleteOutcome::Missing => Err(AppError::NotFound(format!("event {id} not found"))),
            DeleteOutcome::Started => Err(started_delete()),
            DeleteOutcome::HasTickets => {
                warn!(event_id = id, "ticket sold while the event was being deleted");
                Err(BookingEngine::tickets_sold())
            }
        }
    }

    pub async fn is_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, AppError> {
        self.events.is_name_unique(name, exclude_id).await
    }

    async fn ensure_name_unique(&self, name: &str, exclude_id: Option<i64>) -> Result<(), AppError> {
        if self.is_name_unique(name, exclude_id).await? {
            Ok(())
        } else {
            Err(AppError::Conflict("event name must be unique".to_string()))
        }
    }
}

fn started_delete() -> AppError {
    AppError::Conflict("event cannot be deleted because it has already started".to_string())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::ValidationError("event name is required".to_string()));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), AppError> {
    if capacity < 0 {
        return Err(AppError::ValidationError(
            "capacity must be greater than or equal to zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "price must be greater than or equal to zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::ValidationError(
            "end_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_negative_capacity_is_invalid() {
        assert!(validate_capacity(0).is_ok());
        assert!(matches!(
            validate_capacity(-1),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_negative_price_is_invalid() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(1999, 2)).is_ok());
        assert!(matches!(
            validate_price(Decimal::new(-1, 2)),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_blank_name_is_invalid() {
        assert!(validate_name("Concert").is_ok());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_end_before_start_is_invalid() {
        let start = Utc::now();
        assert!(validate_dates(start, start).is_ok());
        assert!(validate_dates(start, start + Duration::hours(1)).is_ok());
        assert!(validate_dates(start, start - Duration::hours(1)).is_err());
    }
}
