#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use eventix_server::config::Config;
use eventix_server::models::{Event, EventStatus, NewEvent, Role, User};
use eventix_server::state::AppState;
use eventix_server::store::{EventStore, MemoryStore};

pub const JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [("JWT_SECRET", JWT_SECRET), ("BCRYPT_COST", "4")]
        .into_iter()
        .collect();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).expect("test config")
}

pub fn setup() -> (AppState, Arc<MemoryStore>, Config) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), &config);
    (state, store, config)
}

pub fn event_starting_at(name: &str, capacity: i32, start: DateTime<Utc>) -> NewEvent {
    NewEvent {
        name: name.to_string(),
        description: format!("{name} description"),
        start_date: start,
        end_date: start + Duration::hours(4),
        capacity,
        price: Decimal::new(2500, 2),
        status: EventStatus::Active,
    }
}

pub fn upcoming_event(name: &str, capacity: i32) -> NewEvent {
    event_starting_at(name, capacity, Utc::now() + Duration::days(30))
}

pub async fn create_event(state: &AppState, name: &str, capacity: i32) -> Event {
    state
        .catalog
        .create(upcoming_event(name, capacity))
        .await
        .expect("create event")
}

/// Inserts straight into the store so the start date can be in the past.
pub async fn create_started_event(store: &MemoryStore, name: &str, capacity: i32) -> Event {
    let start = Utc::now() - Duration::hours(1);
    EventStore::insert(store, event_starting_at(name, capacity, start))
        .await
        .expect("insert started event")
}

pub async fn register(state: &AppState, username: &str, role: Role) -> User {
    state
        .users
        .register(username, "correct-horse", role)
        .await
        .expect("register user")
}

pub async fn remaining(state: &AppState, event_id: i64) -> i32 {
    state.catalog.get(event_id).await.expect("event").capacity
}
