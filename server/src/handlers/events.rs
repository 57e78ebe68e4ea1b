use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::middleware::{AdminOnly, UserOnly};
use crate::models::{EventFilter, EventStatus, EventUpdate, NewEvent, Page, PageParams};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub name: Option<String>,
    pub status: Option<EventStatus>,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub min_capacity: Option<i32>,
}

impl EventListQuery {
    fn into_parts(self) -> (EventFilter, Page) {
        let page = Page::from(PageParams {
            page: self.page,
            size: self.size,
        });
        let filter = EventFilter {
            name: self.name.filter(|name| !name.is_empty()),
            status: self.status,
            starts_after: self.starts_after,
            starts_before: self.starts_before,
            min_capacity: self.min_capacity,
        };
        (filter, page)
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    _caller: UserOnly,
    Query(query): Query<EventListQuery>,
) -> Result<Response, AppError> {
    let (filter, page) = query.into_parts();
    let events = state.catalog.list(&filter, page).await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    _caller: UserOnly,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let event = state.catalog.get(id).await?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn create_event(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Json(body): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = state.catalog.create(body).await?;
    Ok(created(event, "Event created successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Path(id): Path<i64>,
    Json(body): Json<EventUpdate>,
) -> Result<Response, AppError> {
    let event = state.catalog.update(id, body).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state.catalog.delete(id).await?;
    Ok(empty_success("Event deleted successfully"))
}
