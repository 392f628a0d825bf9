//! Mock channel service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::{
    Channel, ChannelId, ChannelService, ChatError, CreateChannelRequest, GuildId, Message,
    MessageId, UserId,
};
use crate::perms::{Overwrite, Permissions};

fn injected_failure(what: &str) -> ChatError {
    ChatError::Api {
        status: 500,
        message: format!("injected {what} failure"),
    }
}

/// Mock implementation of the ChannelService trait.
///
/// Provides controllable behavior for testing:
/// - Track created channels, deletions, sent messages and permission edits
/// - Seed message history honoring before-cursor pagination
/// - Simulate failures per operation
pub struct MockChannelService {
    /// Live channels, served by `guild_channels`.
    channels: Arc<RwLock<Vec<Channel>>>,
    /// Recorded create_channel results.
    created: Arc<RwLock<Vec<Channel>>>,
    /// Recorded delete_channel calls.
    deleted: Arc<RwLock<Vec<ChannelId>>>,
    /// Recorded send_message calls.
    sent: Arc<RwLock<Vec<(ChannelId, String)>>>,
    /// Recorded set_channel_permission calls.
    permission_edits: Arc<RwLock<Vec<(ChannelId, Overwrite)>>>,
    /// Seeded message history per channel.
    history: Arc<RwLock<HashMap<ChannelId, Vec<Message>>>>,
    /// Counter for generated channel ids.
    next_channel_id: Arc<RwLock<ChannelId>>,
    fail_next_create: Arc<RwLock<bool>>,
    fail_next_delete: Arc<RwLock<bool>>,
    fail_next_fetch: Arc<RwLock<bool>>,
    fail_next_send: Arc<RwLock<bool>>,
    bot_user_id: UserId,
    bot_permissions: Permissions,
}

impl Default for MockChannelService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannelService {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            sent: Arc::new(RwLock::new(Vec::new())),
            permission_edits: Arc::new(RwLock::new(Vec::new())),
            history: Arc::new(RwLock::new(HashMap::new())),
            next_channel_id: Arc::new(RwLock::new(1000)),
            fail_next_create: Arc::new(RwLock::new(false)),
            fail_next_delete: Arc::new(RwLock::new(false)),
            fail_next_fetch: Arc::new(RwLock::new(false)),
            fail_next_send: Arc::new(RwLock::new(false)),
            bot_user_id: 99,
            bot_permissions: Permissions::IN_TICKET,
        }
    }

    /// Pre-populate a live channel.
    pub async fn seed_channel(&self, channel: Channel) {
        self.channels.write().await.push(channel);
    }

    /// Seed the message history of a channel. Order does not matter; fetches
    /// return newest id first.
    pub async fn seed_history(&self, channel_id: ChannelId, messages: Vec<Message>) {
        self.history.write().await.insert(channel_id, messages);
    }

    pub async fn created_channels(&self) -> Vec<Channel> {
        self.created.read().await.clone()
    }

    pub async fn deleted_channels(&self) -> Vec<ChannelId> {
        self.deleted.read().await.clone()
    }

    pub async fn sent_messages(&self) -> Vec<(ChannelId, String)> {
        self.sent.read().await.clone()
    }

    pub async fn permission_edits(&self) -> Vec<(ChannelId, Overwrite)> {
        self.permission_edits.read().await.clone()
    }

    pub async fn fail_next_create(&self) {
        *self.fail_next_create.write().await = true;
    }

    pub async fn fail_next_delete(&self) {
        *self.fail_next_delete.write().await = true;
    }

    pub async fn fail_next_fetch(&self) {
        *self.fail_next_fetch.write().await = true;
    }

    pub async fn fail_next_send(&self) {
        *self.fail_next_send.write().await = true;
    }

    async fn take_flag(flag: &RwLock<bool>) -> bool {
        let mut flag = flag.write().await;
        std::mem::take(&mut *flag)
    }
}

#[async_trait]
impl ChannelService for MockChannelService {
    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel, ChatError> {
        if Self::take_flag(&self.fail_next_create).await {
            return Err(injected_failure("create"));
        }

        let id = {
            let mut next = self.next_channel_id.write().await;
            *next += 1;
            *next
        };

        let channel = Channel {
            id,
            guild_id: request.guild_id,
            name: request.name,
            parent_id: request.parent_id,
            overwrites: request.overwrites,
        };

        self.channels.write().await.push(channel.clone());
        self.created.write().await.push(channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChatError> {
        if Self::take_flag(&self.fail_next_delete).await {
            return Err(injected_failure("delete"));
        }

        self.channels.write().await.retain(|c| c.id != channel_id);
        self.deleted.write().await.push(channel_id);
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, ChatError> {
        if Self::take_flag(&self.fail_next_fetch).await {
            return Err(injected_failure("fetch"));
        }

        let history = self.history.read().await;
        let mut messages: Vec<Message> = history
            .get(&channel_id)
            .map(|m| m.clone())
            .unwrap_or_default();

        messages.sort_by(|a, b| b.id.cmp(&a.id));
        let page = messages
            .into_iter()
            .filter(|m| before.map_or(true, |cursor| m.id < cursor))
            .take(limit as usize)
            .collect();

        Ok(page)
    }

    async fn set_channel_permission(
        &self,
        channel_id: ChannelId,
        overwrite: &Overwrite,
    ) -> Result<(), ChatError> {
        self.permission_edits
            .write()
            .await
            .push((channel_id, overwrite.clone()));

        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.iter_mut().find(|c| c.id == channel_id) {
            if let Some(existing) = channel
                .overwrites
                .iter_mut()
                .find(|o| o.same_principal(overwrite))
            {
                *existing = overwrite.clone();
            } else {
                channel.overwrites.push(overwrite.clone());
            }
        }

        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), ChatError> {
        if Self::take_flag(&self.fail_next_send).await {
            return Err(injected_failure("send"));
        }

        self.sent
            .write()
            .await
            .push((channel_id, content.to_string()));
        Ok(())
    }

    async fn guild_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, ChatError> {
        Ok(self
            .channels
            .read()
            .await
            .iter()
            .filter(|c| c.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn current_permissions(&self, _guild_id: GuildId) -> Result<Permissions, ChatError> {
        Ok(self.bot_permissions)
    }

    async fn current_user_id(&self) -> Result<UserId, ChatError> {
        Ok(self.bot_user_id)
    }
}
