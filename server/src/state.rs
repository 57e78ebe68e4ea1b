use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    AuthSessionManager, BookingEngine, EventCatalog, ReportAggregator, TokenCodec, UserDirectory,
};
use crate::store::{EventStore, RevocationStore, TicketStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<EventCatalog>,
    pub bookings: Arc<BookingEngine>,
    pub reports: Arc<ReportAggregator>,
    pub auth: Arc<AuthSessionManager>,
    pub users: Arc<UserDirectory>,
}

impl AppState {
    /// Wires every service over one backend that implements all four stores.
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: EventStore + TicketStore + UserStore + RevocationStore + 'static,
    {
        let events: Arc<dyn EventStore> = store.clone();
        let tickets: Arc<dyn TicketStore> = store.clone();
        let users: Arc<dyn UserStore> = store.clone();
        let revocations: Arc<dyn RevocationStore> = store;

        let bookings = Arc::new(BookingEngine::new(
            events.clone(),
            tickets.clone(),
            users.clone(),
        ));

        Self {
            catalog: Arc::new(EventCatalog::new(events, bookings.clone())),
            bookings,
            reports: Arc::new(ReportAggregator::new(tickets)),
            auth: Arc::new(AuthSessionManager::new(
                users.clone(),
                revocations,
                TokenCodec::new(&config.jwt_secret),
                config.token_ttl,
                config.bcrypt_cost,
            )),
            users: Arc::new(UserDirectory::new(users, config.bcrypt_cost)),
        }
    }
}
