//! Ticket records, per-guild settings and their persistence.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{StoreError, TicketStore, TICKET_ID_NAMESPACE};
pub use types::{GuildTicketConfig, Ticket, TicketParticipant};
