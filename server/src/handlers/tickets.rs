use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::middleware::UserOnly;
use crate::models::{Page, PageParams, Ticket, TicketFilter, TicketStatus, TicketUpdate};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub event_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub event_id: Option<i64>,
    pub status: Option<TicketStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Loads a ticket the caller owns. Someone else's ticket looks missing.
async fn owned_ticket(state: &AppState, caller: &UserOnly, id: i64) -> Result<Ticket, AppError> {
    let ticket = state.bookings.get(id).await?;
    if ticket.user_id != caller.user_id() {
        return Err(AppError::NotFound(format!("ticket {id} not found")));
    }
    Ok(ticket)
}

pub async fn list_tickets(
    State(state): State<AppState>,
    caller: UserOnly,
    Query(query): Query<TicketListQuery>,
) -> Result<Response, AppError> {
    let page = Page::from(PageParams {
        page: query.page,
        size: query.size,
    });
    let filter = TicketFilter {
        event_id: query.event_id,
        user_id: Some(caller.user_id()),
        status: query.status,
        created_after: query.created_after,
        created_before: query.created_before,
    };
    let tickets = state.bookings.list(&filter, page).await?;
    Ok(success(tickets, "Tickets retrieved successfully"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    caller: UserOnly,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let ticket = owned_ticket(&state, &caller, id).await?;
    Ok(success(ticket, "Ticket retrieved successfully"))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    caller: UserOnly,
    Json(body): Json<BookingRequest>,
) -> Result<Response, AppError> {
    let ticket = state
        .bookings
        .create_booking(body.event_id, caller.user_id(), body.quantity)
        .await?;
    Ok(created(ticket, "Ticket created successfully"))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    caller: UserOnly,
    Path(id): Path<i64>,
    Json(body): Json<TicketUpdate>,
) -> Result<Response, AppError> {
    owned_ticket(&state, &caller, id).await?;
    let ticket = state.bookings.update_booking(id, body).await?;
    Ok(success(ticket, "Ticket updated successfully"))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    caller: UserOnly,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    owned_ticket(&state, &caller, id).await?;
    let ticket = state.bookings.cancel_booking(id).await?;
    Ok(success(ticket, "Ticket cancelled successfully"))
}
