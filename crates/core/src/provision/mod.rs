//! Ticket channel provisioning.
//!
//! Opening a ticket allocates a sequential local id, derives the channel's
//! permission overwrites, creates the channel under the configured category
//! and persists the ticket record before anything user-visible happens in
//! the new channel.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chat::{
    ChannelService, ChatError, CreateChannelRequest, GuildSnapshot, UserId,
};
use crate::metrics;
use crate::perms::{merge_overwrites, Overwrite, Permissions};
use crate::ticket::{GuildTicketConfig, StoreError, Ticket, TicketStore, TICKET_ID_NAMESPACE};

/// Most open tickets a single author may hold per guild.
pub const MAX_OPEN_TICKETS: usize = 3;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("tickets are not enabled in this guild")]
    Disabled,

    #[error("no ticket category is configured for this guild")]
    NoTicketCategory,

    #[error("missing permissions: {0}")]
    MissingPermissions(String),

    #[error("you already have {MAX_OPEN_TICKETS} open tickets")]
    MaxOpenTickets,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OpenError {
    /// True when the failure is the caller's to fix rather than a fault in
    /// the service or the platform.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            OpenError::Disabled
                | OpenError::NoTicketCategory
                | OpenError::MissingPermissions(_)
                | OpenError::MaxOpenTickets
        )
    }
}

/// Details of an open request.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub author_id: UserId,
    pub author_display_name: String,
    pub title: String,
    pub question: String,
}

pub struct TicketProvisioner {
    channels: Arc<dyn ChannelService>,
    store: Arc<dyn TicketStore>,
}

impl TicketProvisioner {
    pub fn new(channels: Arc<dyn ChannelService>, store: Arc<dyn TicketStore>) -> Self {
        Self { channels, store }
    }

    /// Open a ticket for `request.author_id` in the snapshotted guild.
    pub async fn open(
        &self,
        guild: &GuildSnapshot,
        config: &GuildTicketConfig,
        request: OpenRequest,
    ) -> Result<Ticket, OpenError> {
        let category = match config.ticket_category {
            Some(id) if guild.has_channel(id) => id,
            _ => return Err(OpenError::NoTicketCategory),
        };

        let missing = guild.bot_permissions.missing(Permissions::IN_TICKET);
        if !missing.is_empty() {
            return Err(OpenError::MissingPermissions(missing.humanize()));
        }

        // count only open tickets whose channel still exists; rows orphaned
        // by an out-of-band channel delete do not hold the slot
        let open = self
            .store
            .find_open_tickets(guild.guild_id, request.author_id)
            .await?;
        let live = open.iter().filter(|t| guild.has_channel(t.channel_id)).count();
        if live >= MAX_OPEN_TICKETS {
            return Err(OpenError::MaxOpenTickets);
        }

        let local_id = self
            .store
            .next_local_id(guild.guild_id, TICKET_ID_NAMESPACE)
            .await?;

        let channel = self
            .channels
            .create_channel(CreateChannelRequest {
                guild_id: guild.guild_id,
                name: format!("ticket-{local_id:04}"),
                parent_id: Some(category),
                overwrites: self.build_overwrites(guild, config, request.author_id),
            })
            .await?;

        let ticket = Ticket {
            guild_id: guild.guild_id,
            local_id,
            channel_id: channel.id,
            title: request.title,
            question: request.question,
            author_id: request.author_id,
            author_display_name: request.author_display_name,
            created_at: Utc::now(),
            closed_at: None,
            logs: None,
        };
        self.store.insert_ticket(&ticket).await?;

        info!(
            guild = guild.guild_id,
            ticket = local_id,
            channel = channel.id,
            "opened ticket"
        );
        metrics::TICKETS_OPENED.with_label_values(&["opened"]).inc();

        // the ticket exists either way; a lost greeting is not worth failing
        // the open for
        let greeting = format!(
            "Hello {}! A moderator will respond to your inquiry shortly!",
            ticket.author_display_name
        );
        if let Err(e) = self.channels.send_message(channel.id, &greeting).await {
            warn!(channel = channel.id, error = %e, "failed to send greeting");
        }

        Ok(ticket)
    }

    /// Overwrites for a fresh ticket channel: the guild is locked out, the
    /// author and the bot are let in, and every mod and admin role keeps
    /// full access. A role listed in both sets ends up with one combined
    /// entry thanks to the merge.
    fn build_overwrites(
        &self,
        guild: &GuildSnapshot,
        config: &GuildTicketConfig,
        author_id: UserId,
    ) -> Vec<Overwrite> {
        let base: Vec<Overwrite> = config
            .mod_roles
            .iter()
            .chain(config.admin_roles.iter())
            .map(|&role| Overwrite::role_allow(role, Permissions::IN_TICKET))
            .collect();

        let overrides = vec![
            // @everyone shares its id with the guild
            Overwrite::role_deny(guild.guild_id, Permissions::IN_TICKET),
            Overwrite::member_allow(author_id, Permissions::IN_TICKET),
            Overwrite::member_allow(guild.bot_user_id, Permissions::IN_TICKET),
        ];

        merge_overwrites(&base, &overrides)
    }
}
