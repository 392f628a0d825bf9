//! Persistence trait for tickets, participants and guild settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::chat::{ChannelId, GuildId, UserId};

use super::types::{GuildTicketConfig, Ticket, TicketParticipant};

/// Counter namespace used for ticket local ids.
pub const TICKET_ID_NAMESPACE: &str = "ticket";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),
}

/// Storage backend for the ticket subsystem.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Atomically increment and return the next id in a per-guild counter
    /// namespace. The first call for a `(guild, namespace)` pair returns 1.
    async fn next_local_id(&self, guild_id: GuildId, namespace: &str) -> Result<i64, StoreError>;

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Ticket bound to a channel, if any.
    async fn get_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>, StoreError>;

    /// All open tickets a user authored in a guild.
    async fn find_open_tickets(
        &self,
        guild_id: GuildId,
        author_id: UserId,
    ) -> Result<Vec<Ticket>, StoreError>;

    /// Mark a ticket closed, persisting the close time and transcript text.
    async fn close_ticket(
        &self,
        guild_id: GuildId,
        local_id: i64,
        closed_at: DateTime<Utc>,
        logs: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Hard-delete the ticket bound to a channel, cascading to its
    /// participants. Returns the number of tickets removed.
    async fn delete_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<u64, StoreError>;

    async fn add_participant(&self, participant: &TicketParticipant) -> Result<(), StoreError>;

    async fn participants(
        &self,
        guild_id: GuildId,
        local_id: i64,
    ) -> Result<Vec<TicketParticipant>, StoreError>;

    async fn guild_config(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<GuildTicketConfig>, StoreError>;

    async fn save_guild_config(
        &self,
        guild_id: GuildId,
        config: &GuildTicketConfig,
    ) -> Result<(), StoreError>;
}
