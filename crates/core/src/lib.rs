pub mod archive;
pub mod chat;
pub mod close_guard;
pub mod config;
pub mod lifecycle;
pub mod metrics;
pub mod perms;
pub mod provision;
pub mod testing;
pub mod ticket;
pub mod transcript;

pub use chat::{ChannelService, ChatError, DiscordRestService, GuildSnapshot, TransferService};
pub use close_guard::{CloseGuard, ClosePermit};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use lifecycle::{CloseError, CloseOutcome, TicketLifecycle};
pub use provision::{OpenError, OpenRequest, MAX_OPEN_TICKETS};
pub use ticket::{GuildTicketConfig, SqliteTicketStore, StoreError, Ticket, TicketStore};
