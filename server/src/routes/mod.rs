use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, Config, SecurityHeadersLayer};
use crate::handlers::{auth, events, health_check, reports, tickets, users};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let admin = Router::new()
        .route("/events", post(events::create_event))
        .route(
            "/events/:id",
            put(events::update_event).delete(events::delete_event),
        )
        .route("/reports/summary", get(reports::summary_report))
        .route("/reports/event/:id", get(reports::event_report))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/role", put(users::update_user_role));

    Router::new()
        .route("/health", get(health_check))
        .route("/users/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route(
            "/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route(
            "/tickets/:id",
            get(tickets::get_ticket).put(tickets::update_ticket),
        )
        .route("/tickets/:id/cancel", patch(tickets::cancel_ticket))
        .nest("/admin", admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SecurityHeadersLayer::new(config.is_production))
        .layer(create_cors_layer(config.cors_allowed_origins.as_deref()))
}
