//! Capacity-safe ticket issuance and cancellation.
//!
//! A ticket is created `purchased` and may move to `cancelled` once. The
//! capacity check here is only a fast path for a clear error; the store
//! re-checks inside the same atomic write that takes the capacity, so two
//! racing bookings can never both pass.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::models::{
    CancelOutcome, EventStatus, NewTicket, Page, Paginated, Ticket, TicketFilter, TicketStatus,
    TicketUpdate,
};
use crate::store::{EventStore, TicketStore, UserStore};
use crate::utils::error::AppError;

pub struct BookingEngine {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
    users: Arc<dyn UserStore>,
}

impl BookingEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            events,
            tickets,
            users,
        }
    }

    pub async fn create_booking(
        &self,
        event_id: i64,
        user_id: i64,
        quantity: i32,
    ) -> Result<Ticket, AppError> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(
                "quantity must be greater than zero".to_string(),
            ));
        }

        let event = self
            .events
            .find(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {event_id} not found")))?;

        if event.status == EventStatus::Completed || event.has_ended(Utc::now()) {
            return Err(AppError::Conflict("event is no longer on sale".to_string()));
        }
        if quantity > event.capacity {
            warn!(event_id, quantity, capacity = event.capacity, "booking exceeds capacity");
            return Err(capacity_exceeded());
        }

        let price = event.price * Decimal::from(quantity);
        let ticket = self
            .tickets
            .issue_ticket(NewTicket {
                event_id,
                user_id,
                quantity,
                price,
            })
            .await?
            .ok_or_else(|| {
                warn!(event_id, quantity, "booking lost the race for capacity");
                capacity_exceeded()
            })?;

        info!(ticket_id = ticket.id, event_id, user_id, quantity, "ticket purchased");
        Ok(ticket)
    }

    pub async fn cancel_booking(&self, ticket_id: i64) -> Result<Ticket, AppError> {
        let ticket = self.get(ticket_id).await?;
        if ticket.status != TicketStatus::Purchased {
            return Err(already_cancelled());
        }
        if self.events.find(ticket.event_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "event {} not found",
                ticket.event_id
            )));
        }

        match self.tickets.cancel_ticket(ticket_id).await? {
            CancelOutcome::Cancelled(ticket) => {
                info!(
                    ticket_id,
                    event_id = ticket.event_id,
                    quantity = ticket.quantity,
                    "ticket cancelled"
                );
                Ok(ticket)
            }
            CancelOutcome::NotPurchased => Err(already_cancelled()),
            CancelOutcome::EventMissing => Err(AppError::NotFound(format!(
                "event {} not found",
                ticket.event_id
            ))),
        }
    }

    /// Changes a purchased ticket without touching capacity. Quantity changes
    /// are a cancel followed by a new booking.
    pub async fn update_booking(
        &self,
        ticket_id: i64,
        update: TicketUpdate,
    ) -> Result<Ticket, AppError> {
        let existing = self.get(ticket_id).await?;
        if existing.status != TicketStatus::Purchased {
            return Err(AppError::Conflict(
                "ticket can only be updated while it is purchased".to_string(),
            ));
        }
        if let Some(user_id) = update.user_id {
            if self.users.find(user_id).await?.is_none() {
                return Err(AppError::NotFound(format!("user {user_id} not found")));
            }
        }

        let ticket = self
            .tickets
            .update_purchased(ticket_id, update)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("ticket can only be updated while it is purchased".to_string())
            })?;
        info!(ticket_id, user_id = ticket.user_id, "ticket updated");
        Ok(ticket)
    }

    pub async fn get(&self, ticket_id: i64) -> Result<Ticket, AppError> {
        self.tickets
            .find(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {ticket_id} not found")))
    }

    pub async fn list(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<Paginated<Ticket>, AppError> {
        let (tickets, total) = self.tickets.list(filter, page).await?;
        Ok(Paginated::new(tickets, total, page))
    }

    /// Refuses once any ticket was ever purchased for the event. Every ticket
    /// starts out purchased and none is ever removed.
    pub async fn can_delete_event(&self, event_id: i64) -> Result<(), AppError> {
        if self.tickets.any_for_event(event_id).await? {
            return Err(Self::tickets_sold());
        }
        Ok(())
    }

    pub(crate) fn tickets_sold() -> AppError {
        AppError::Conflict("event cannot be deleted because tickets were already sold".to_string())
    }
}

fn capacity_exceeded() -> AppError {
    AppError::Conflict("quantity exceeds event capacity".to_string())
}

fn already_cancelled() -> AppError {
    AppError::Conflict("ticket cannot be cancelled".to_string())
}
