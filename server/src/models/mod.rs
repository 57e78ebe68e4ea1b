pub mod event;
pub mod pagination;
pub mod revoked_token;
pub mod ticket;
pub mod user;

pub use event::{DeleteOutcome, Event, EventFilter, EventStatus, EventUpdate, NewEvent};
pub use pagination::{Page, PageParams, Paginated};
pub use revoked_token::RevokedToken;
pub use ticket::{
    CancelOutcome, NewTicket, SalesTotals, Ticket, TicketFilter, TicketStatus, TicketUpdate,
};
pub use user::{NewUser, Role, User, UserProfile};
