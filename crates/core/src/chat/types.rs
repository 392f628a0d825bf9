//! Types and traits for the chat platform boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::perms::{Overwrite, Permissions};

pub type GuildId = u64;
pub type ChannelId = u64;
pub type UserId = u64;
pub type RoleId = u64;
pub type MessageId = u64;

/// Errors from the chat platform boundary.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Connection-level failure (DNS, refused, TLS).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The platform rejected the request.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ChatError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else if e.is_connect() {
            ChatError::ConnectionFailed(e.to_string())
        } else {
            ChatError::Api {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

/// A channel as seen by the ticket subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    /// Parent category, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ChannelId>,
    /// Current permission overwrites on the channel.
    #[serde(default)]
    pub overwrites: Vec<Overwrite>,
}

/// Author of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: UserId,
    /// Display name as rendered in transcripts.
    pub name: String,
}

/// A binary attachment referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub size_bytes: u64,
    pub url: String,
}

/// A message in a channel's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: MessageAuthor,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Rich embed payloads, kept opaque; transcripts serialize them as-is.
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
}

/// Request to create a channel.
#[derive(Debug, Clone)]
pub struct CreateChannelRequest {
    pub guild_id: GuildId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
    pub overwrites: Vec<Overwrite>,
}

/// Channel provisioning, teardown, history and permission operations.
#[async_trait]
pub trait ChannelService: Send + Sync {
    /// Create a guild text channel with the given overwrites.
    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel, ChatError>;

    /// Destroy a channel.
    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChatError>;

    /// Fetch up to `limit` messages strictly older than `before`, newest
    /// first. `before = None` starts from the most recent message.
    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, ChatError>;

    /// Create or replace a single permission overwrite on a channel.
    async fn set_channel_permission(
        &self,
        channel_id: ChannelId,
        overwrite: &Overwrite,
    ) -> Result<(), ChatError>;

    /// Send a plain text message.
    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), ChatError>;

    /// Snapshot of all channels in a guild.
    async fn guild_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, ChatError>;

    /// The bot's own effective guild-level permission set.
    async fn current_permissions(&self, guild_id: GuildId) -> Result<Permissions, ChatError>;

    /// The bot's own user id.
    async fn current_user_id(&self) -> Result<UserId, ChatError>;
}

/// Binary file transfer in and out of the platform.
#[async_trait]
pub trait TransferService: Send + Sync {
    /// Download a file by URL into memory.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ChatError>;

    /// Upload a file into a channel, optionally alongside a text message.
    async fn upload_file(
        &self,
        channel_id: ChannelId,
        filename: &str,
        data: Vec<u8>,
        message: Option<&str>,
    ) -> Result<(), ChatError>;
}

/// A read-only snapshot of guild state taken once per request, so the
/// components never issue per-ticket roster lookups.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub guild_id: GuildId,
    pub channels: Vec<Channel>,
    pub bot_user_id: UserId,
    pub bot_permissions: Permissions,
}

impl GuildSnapshot {
    /// Look up a channel in the snapshot.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.channel(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_channel_lookup() {
        let snapshot = GuildSnapshot {
            guild_id: 1,
            channels: vec![Channel {
                id: 10,
                guild_id: 1,
                name: "ticket-0001".to_string(),
                parent_id: Some(5),
                overwrites: vec![],
            }],
            bot_user_id: 99,
            bot_permissions: Permissions::IN_TICKET,
        };

        assert!(snapshot.has_channel(10));
        assert!(!snapshot.has_channel(11));
        assert_eq!(snapshot.channel(10).unwrap().parent_id, Some(5));
    }
}
