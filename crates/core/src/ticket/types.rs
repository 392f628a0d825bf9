//! Ticket domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChannelId, GuildId, RoleId, UserId};

/// A support ticket. Identified by `(guild_id, local_id)`; local ids are
/// sequential within a guild so channel names stay human friendly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub guild_id: GuildId,
    pub local_id: i64,
    pub channel_id: ChannelId,
    pub title: String,
    pub question: String,
    pub author_id: UserId,
    pub author_display_name: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Rendered transcript text, persisted at close time.
    pub logs: Option<String>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// A user added to a ticket channel after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketParticipant {
    pub ticket_guild_id: GuildId,
    pub ticket_local_id: i64,
    pub user_id: UserId,
}

/// Per-guild ticket settings, stored as a single row per guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildTicketConfig {
    /// Master switch for the subsystem in this guild.
    #[serde(default)]
    pub enabled: bool,

    /// Category new ticket channels are created under.
    #[serde(default)]
    pub ticket_category: Option<ChannelId>,

    /// Roles granted full access to every ticket channel.
    #[serde(default)]
    pub mod_roles: Vec<RoleId>,

    /// Roles granted access to admin-only transcripts.
    #[serde(default)]
    pub admin_roles: Vec<RoleId>,

    /// Channel transcripts and archives are posted to.
    #[serde(default)]
    pub transcripts_channel: Option<ChannelId>,

    /// Channel for transcripts of admin-only tickets.
    #[serde(default)]
    pub transcripts_channel_admin_only: Option<ChannelId>,

    /// Render and upload a plain text transcript at close time.
    #[serde(default)]
    pub use_text_transcripts: bool,

    /// Download and re-upload attachments at close time.
    #[serde(default)]
    pub download_attachments: bool,

    /// Channel that receives a short notice when a ticket closes.
    #[serde(default)]
    pub status_channel: Option<ChannelId>,
}

impl Default for GuildTicketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ticket_category: None,
            mod_roles: Vec::new(),
            admin_roles: Vec::new(),
            transcripts_channel: None,
            transcripts_channel_admin_only: None,
            use_text_transcripts: false,
            download_attachments: false,
            status_channel: None,
        }
    }
}

impl GuildTicketConfig {
    /// Destination channel for a ticket's transcript. Admin-only tickets go
    /// to the admin-only channel when one is configured, otherwise they fall
    /// back to the general transcripts channel.
    pub fn transcript_channel(&self, admin_only: bool) -> Option<ChannelId> {
        if admin_only {
            self.transcripts_channel_admin_only
                .or(self.transcripts_channel)
        } else {
            self.transcripts_channel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_open_state() {
        let mut ticket = Ticket {
            guild_id: 1,
            local_id: 1,
            channel_id: 10,
            title: "help".to_string(),
            question: "how".to_string(),
            author_id: 7,
            author_display_name: "alice".to_string(),
            created_at: Utc::now(),
            closed_at: None,
            logs: None,
        };
        assert!(ticket.is_open());

        ticket.closed_at = Some(Utc::now());
        assert!(!ticket.is_open());
    }

    #[test]
    fn test_transcript_channel_routing() {
        let config = GuildTicketConfig {
            transcripts_channel: Some(100),
            transcripts_channel_admin_only: Some(200),
            ..Default::default()
        };
        assert_eq!(config.transcript_channel(false), Some(100));
        assert_eq!(config.transcript_channel(true), Some(200));

        let no_admin_channel = GuildTicketConfig {
            transcripts_channel: Some(100),
            ..Default::default()
        };
        assert_eq!(no_admin_channel.transcript_channel(true), Some(100));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: GuildTicketConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert!(config.mod_roles.is_empty());
        assert_eq!(config.transcript_channel(true), None);
    }
}
