//! Ticket lifecycle orchestration.
//!
//! [`TicketLifecycle`] ties the provisioner, transcript builder, archiver
//! and close guard together behind the operations the API layer exposes:
//! open, close, add participant, and reconciliation after an out-of-band
//! channel delete.
//!
//! Close ordering matters: the transcript and archives are captured and
//! uploaded first, then the channel is deleted, and only then is the ticket
//! marked closed. A failed channel delete aborts the close so the ticket
//! stays open and can be retried; a failed history fetch only skips the
//! transcript step.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::archive::{ArchiveSummary, AttachmentArchiver};
use crate::chat::{
    ChannelId, ChannelService, ChatError, GuildId, GuildSnapshot, TransferService, UserId,
};
use crate::close_guard::CloseGuard;
use crate::metrics;
use crate::perms::{Overwrite, Permissions, PrincipalKind};
use crate::provision::{OpenError, OpenRequest, TicketProvisioner};
use crate::ticket::{GuildTicketConfig, StoreError, Ticket, TicketParticipant, TicketStore};
use crate::transcript::{render_transcript, TranscriptBuilder};

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("this channel is not a ticket")]
    NotATicket,

    #[error("this ticket is already being closed")]
    AlreadyClosing,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CloseError {
    pub fn is_user_error(&self) -> bool {
        matches!(self, CloseError::NotATicket | CloseError::AlreadyClosing)
    }
}

/// What happened during a close, for the API response and logs.
#[derive(Debug, Default)]
pub struct CloseOutcome {
    pub local_id: i64,
    pub messages: usize,
    pub transcript_uploaded: bool,
    pub archive: ArchiveSummary,
}

pub struct TicketLifecycle {
    channels: Arc<dyn ChannelService>,
    transfer: Arc<dyn TransferService>,
    store: Arc<dyn TicketStore>,
    provisioner: TicketProvisioner,
    transcripts: TranscriptBuilder,
    archiver: AttachmentArchiver,
    close_guard: Arc<CloseGuard>,
}

impl TicketLifecycle {
    pub fn new(
        channels: Arc<dyn ChannelService>,
        transfer: Arc<dyn TransferService>,
        store: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            provisioner: TicketProvisioner::new(channels.clone(), store.clone()),
            transcripts: TranscriptBuilder::new(channels.clone()),
            archiver: AttachmentArchiver::new(transfer.clone()),
            close_guard: CloseGuard::new(),
            channels,
            transfer,
            store,
        }
    }

    /// The guard serializing closes, shared with callers that need to hold
    /// a channel closed-for-business across a wider operation.
    pub fn close_guard(&self) -> Arc<CloseGuard> {
        Arc::clone(&self.close_guard)
    }

    async fn snapshot(&self, guild_id: GuildId) -> Result<GuildSnapshot, ChatError> {
        Ok(GuildSnapshot {
            guild_id,
            channels: self.channels.guild_channels(guild_id).await?,
            bot_user_id: self.channels.current_user_id().await?,
            bot_permissions: self.channels.current_permissions(guild_id).await?,
        })
    }

    async fn config(&self, guild_id: GuildId) -> Result<GuildTicketConfig, StoreError> {
        Ok(self.store.guild_config(guild_id).await?.unwrap_or_default())
    }

    /// Open a ticket in a guild.
    pub async fn open(
        &self,
        guild_id: GuildId,
        request: OpenRequest,
    ) -> Result<Ticket, OpenError> {
        let result = self.try_open(guild_id, request).await;
        if let Err(e) = &result {
            let label = if e.is_user_error() { "rejected" } else { "failed" };
            metrics::TICKETS_OPENED.with_label_values(&[label]).inc();
        }
        result
    }

    async fn try_open(
        &self,
        guild_id: GuildId,
        request: OpenRequest,
    ) -> Result<Ticket, OpenError> {
        let config = self.config(guild_id).await?;
        if !config.enabled {
            return Err(OpenError::Disabled);
        }

        let guild = self.snapshot(guild_id).await?;
        self.provisioner.open(&guild, &config, request).await
    }

    /// Close the ticket bound to a channel.
    pub async fn close(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<CloseOutcome, CloseError> {
        let started = Instant::now();

        let ticket = self
            .store
            .get_by_channel(guild_id, channel_id)
            .await?
            .filter(|t| t.is_open())
            .ok_or(CloseError::NotATicket)?;

        let Some(_permit) = self.close_guard.try_acquire(channel_id) else {
            metrics::CLOSE_CONFLICTS.inc();
            return Err(CloseError::AlreadyClosing);
        };

        let config = self.config(guild_id).await?;
        let closed_at = Utc::now();

        // best effort heads-up in the channel before it disappears
        if let Err(e) = self
            .channels
            .send_message(channel_id, "Closing ticket and saving the transcript...")
            .await
        {
            warn!(channel = channel_id, error = %e, "failed to send close notice");
        }

        let admin_only = self
            .channels
            .guild_channels(guild_id)
            .await
            .map(|channels| {
                channels
                    .iter()
                    .find(|c| c.id == channel_id)
                    .map(|c| is_admin_only(&c.overwrites, &config.mod_roles))
                    .unwrap_or(false)
            })
            .unwrap_or(false);

        let mut outcome = CloseOutcome {
            local_id: ticket.local_id,
            ..Default::default()
        };

        // a failed history fetch skips the transcript and archives but does
        // not abort the close
        let history = match self.transcripts.collect(channel_id).await {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(channel = channel_id, error = %e, "history fetch failed, closing without transcript");
                None
            }
        };

        let mut logs = None;
        if let Some(history) = &history {
            outcome.messages = history.messages.len();

            let mut closing = ticket.clone();
            closing.closed_at = Some(closed_at);
            let rendered = render_transcript(&closing, history);

            if let Some(destination) = config.transcript_channel(admin_only) {
                if config.use_text_transcripts {
                    outcome.transcript_uploaded = self
                        .upload_transcript(&ticket, destination, &rendered)
                        .await;
                }

                if config.download_attachments {
                    outcome.archive = self
                        .archiver
                        .archive(&ticket, destination, &history.attachments)
                        .await;
                }
            }

            logs = Some(rendered);
        }

        // the delete must land before the ticket is marked closed; if it
        // fails the ticket stays open and the close can be retried
        if let Err(e) = self.channels.delete_channel(channel_id).await {
            metrics::CLOSE_DURATION
                .with_label_values(&["failed"])
                .observe(started.elapsed().as_secs_f64());
            return Err(e.into());
        }

        self.store
            .close_ticket(guild_id, ticket.local_id, closed_at, logs.as_deref())
            .await?;

        if let Some(status_channel) = config.status_channel {
            let notice = format!(
                "Ticket #{} - '{}' closed, author {}",
                ticket.local_id, ticket.title, ticket.author_display_name
            );
            if let Err(e) = self.channels.send_message(status_channel, &notice).await {
                warn!(channel = status_channel, error = %e, "failed to post close notice");
            }
        }

        info!(
            guild = guild_id,
            ticket = ticket.local_id,
            messages = outcome.messages,
            "closed ticket"
        );
        metrics::TICKETS_CLOSED.inc();
        metrics::CLOSE_DURATION
            .with_label_values(&["success"])
            .observe(started.elapsed().as_secs_f64());

        Ok(outcome)
    }

    async fn upload_transcript(
        &self,
        ticket: &Ticket,
        destination: ChannelId,
        rendered: &str,
    ) -> bool {
        let filename = format!("transcript-{}-{}.txt", ticket.local_id, ticket.title);
        match self
            .transfer
            .upload_file(destination, &filename, rendered.as_bytes().to_vec(), None)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(%filename, error = %e, "failed to upload transcript");
                false
            }
        }
    }

    /// Grant a user access to a ticket channel. Returns `false` if the user
    /// already had access.
    pub async fn add_participant(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<bool, CloseError> {
        let ticket = self
            .store
            .get_by_channel(guild_id, channel_id)
            .await?
            .filter(|t| t.is_open())
            .ok_or(CloseError::NotATicket)?;

        let channels = self.channels.guild_channels(guild_id).await?;
        let already_in = channels
            .iter()
            .find(|c| c.id == channel_id)
            .map(|c| {
                c.overwrites.iter().any(|o| {
                    o.kind == PrincipalKind::Member
                        && o.id == user_id
                        && o.allow.contains(Permissions::IN_TICKET)
                })
            })
            .unwrap_or(false);
        if already_in {
            return Ok(false);
        }

        self.channels
            .set_channel_permission(
                channel_id,
                &Overwrite::member_allow(user_id, Permissions::IN_TICKET),
            )
            .await?;

        self.store
            .add_participant(&TicketParticipant {
                ticket_guild_id: guild_id,
                ticket_local_id: ticket.local_id,
                user_id,
            })
            .await?;

        info!(
            guild = guild_id,
            ticket = ticket.local_id,
            user = user_id,
            "added ticket participant"
        );
        Ok(true)
    }

    /// Reconcile state after a ticket channel was deleted out of band.
    /// Returns the number of tickets removed; zero means the channel was not
    /// a ticket and nothing happened.
    pub async fn handle_channel_deleted(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<u64, StoreError> {
        let removed = self.store.delete_by_channel(guild_id, channel_id).await?;
        if removed > 0 {
            info!(
                guild = guild_id,
                channel = channel_id,
                "removed tickets for deleted channel"
            );
        }
        Ok(removed)
    }

    /// Persist a guild's ticket settings.
    pub async fn save_guild_config(
        &self,
        guild_id: GuildId,
        config: &GuildTicketConfig,
    ) -> Result<(), StoreError> {
        self.store.save_guild_config(guild_id, config).await
    }

    /// A guild's ticket settings, falling back to the defaults.
    pub async fn guild_config(&self, guild_id: GuildId) -> Result<GuildTicketConfig, StoreError> {
        self.config(guild_id).await
    }

    /// The ticket bound to a channel, if any.
    pub async fn ticket_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>, StoreError> {
        self.store.get_by_channel(guild_id, channel_id).await
    }
}

/// A ticket is admin-only when none of the configured mod roles holds the
/// full in-ticket permission bundle on its channel.
fn is_admin_only(overwrites: &[Overwrite], mod_roles: &[u64]) -> bool {
    !mod_roles.iter().any(|&role| {
        overwrites.iter().any(|o| {
            o.kind == PrincipalKind::Role && o.id == role && o.allow.contains(Permissions::IN_TICKET)
        })
    })
}
