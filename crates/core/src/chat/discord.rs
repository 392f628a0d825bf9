//! Discord REST implementation of the chat platform traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::DiscordConfig;
use crate::perms::{Overwrite, Permissions, PrincipalKind};

use super::types::{
    Attachment, Channel, ChannelId, ChannelService, ChatError, CreateChannelRequest, GuildId,
    Message, MessageAuthor, MessageId, TransferService, UserId,
};

const GUILD_TEXT_CHANNEL: u8 = 0;

/// REST client for the Discord HTTP API, implementing both
/// [`ChannelService`] and [`TransferService`].
pub struct DiscordRestService {
    client: Client,
    config: DiscordConfig,
    /// Cached bot user id, resolved lazily on first use.
    bot_user_id: RwLock<Option<UserId>>,
}

impl DiscordRestService {
    pub fn new(config: DiscordConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ChatError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            bot_user_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.config.token))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::Api {
            status,
            message: body.chars().take(200).collect(),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<WireOverwrite>,
}

#[derive(Debug, Deserialize)]
struct WireOverwrite {
    id: String,
    /// 0 = role, 1 = member.
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    allow: Option<String>,
    #[serde(default)]
    deny: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    filename: String,
    size: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    author: WireUser,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
    #[serde(default)]
    embeds: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireRole {
    id: String,
    permissions: String,
}

fn parse_snowflake(raw: &str) -> Result<u64, ChatError> {
    raw.parse::<u64>()
        .map_err(|_| ChatError::MalformedResponse(format!("bad snowflake: {raw}")))
}

fn parse_permissions(raw: Option<&str>) -> Result<Permissions, ChatError> {
    match raw {
        None | Some("") => Ok(Permissions::NONE),
        Some(s) => s
            .parse::<u64>()
            .map(Permissions)
            .map_err(|_| ChatError::MalformedResponse(format!("bad permission bits: {s}"))),
    }
}

fn to_channel(wire: WireChannel, guild_id: GuildId) -> Result<Channel, ChatError> {
    let mut overwrites = Vec::with_capacity(wire.permission_overwrites.len());
    for ow in wire.permission_overwrites {
        overwrites.push(Overwrite {
            kind: if ow.kind == 0 {
                PrincipalKind::Role
            } else {
                PrincipalKind::Member
            },
            id: parse_snowflake(&ow.id)?,
            allow: parse_permissions(ow.allow.as_deref())?,
            deny: parse_permissions(ow.deny.as_deref())?,
        });
    }

    let guild_id = match wire.guild_id {
        Some(ref raw) => parse_snowflake(raw)?,
        None => guild_id,
    };

    Ok(Channel {
        id: parse_snowflake(&wire.id)?,
        guild_id,
        name: wire.name.unwrap_or_default(),
        parent_id: wire.parent_id.as_deref().map(parse_snowflake).transpose()?,
        overwrites,
    })
}

fn to_message(wire: WireMessage) -> Result<Message, ChatError> {
    let author_name = wire.author.global_name.unwrap_or(wire.author.username);
    Ok(Message {
        id: parse_snowflake(&wire.id)?,
        author: MessageAuthor {
            id: parse_snowflake(&wire.author.id)?,
            name: author_name,
        },
        content: wire.content,
        timestamp: wire.timestamp,
        attachments: wire
            .attachments
            .into_iter()
            .map(|a| Attachment {
                filename: a.filename,
                size_bytes: a.size,
                url: a.url,
            })
            .collect(),
        embeds: wire.embeds,
    })
}

fn overwrite_json(ow: &Overwrite) -> serde_json::Value {
    json!({
        "id": ow.id.to_string(),
        "type": match ow.kind {
            PrincipalKind::Role => 0,
            PrincipalKind::Member => 1,
        },
        "allow": ow.allow.0.to_string(),
        "deny": ow.deny.0.to_string(),
    })
}

// ============================================================================
// Trait implementations
// ============================================================================

#[async_trait]
impl ChannelService for DiscordRestService {
    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel, ChatError> {
        let body = json!({
            "name": request.name,
            "type": GUILD_TEXT_CHANNEL,
            "parent_id": request.parent_id.map(|id| id.to_string()),
            "permission_overwrites": request
                .overwrites
                .iter()
                .map(overwrite_json)
                .collect::<Vec<_>>(),
        });

        debug!(guild = request.guild_id, name = %request.name, "creating channel");

        let response = self
            .auth(
                self.client
                    .post(self.url(&format!("/guilds/{}/channels", request.guild_id))),
            )
            .json(&body)
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let wire: WireChannel = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        to_channel(wire, request.guild_id)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChatError> {
        let response = self
            .auth(
                self.client
                    .delete(self.url(&format!("/channels/{channel_id}"))),
            )
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, ChatError> {
        let mut url = self.url(&format!("/channels/{channel_id}/messages?limit={limit}"));
        if let Some(before) = before {
            url.push_str(&format!("&before={before}"));
        }

        let response = self
            .auth(self.client.get(&url))
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let wire: Vec<WireMessage> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        wire.into_iter().map(to_message).collect()
    }

    async fn set_channel_permission(
        &self,
        channel_id: ChannelId,
        overwrite: &Overwrite,
    ) -> Result<(), ChatError> {
        let body = overwrite_json(overwrite);

        let response = self
            .auth(self.client.put(self.url(&format!(
                "/channels/{channel_id}/permissions/{}",
                overwrite.id
            ))))
            .json(&body)
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), ChatError> {
        let response = self
            .auth(
                self.client
                    .post(self.url(&format!("/channels/{channel_id}/messages"))),
            )
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn guild_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, ChatError> {
        let response = self
            .auth(
                self.client
                    .get(self.url(&format!("/guilds/{guild_id}/channels"))),
            )
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let wire: Vec<WireChannel> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        wire.into_iter().map(|c| to_channel(c, guild_id)).collect()
    }

    async fn current_permissions(&self, guild_id: GuildId) -> Result<Permissions, ChatError> {
        let user_id = self.current_user_id().await?;

        let response = self
            .auth(
                self.client
                    .get(self.url(&format!("/guilds/{guild_id}/members/{user_id}"))),
            )
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let member: WireMember = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        let response = self
            .auth(
                self.client
                    .get(self.url(&format!("/guilds/{guild_id}/roles"))),
            )
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let roles: Vec<WireRole> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        // union of @everyone (role id == guild id) and the member's roles
        let mut perms = Permissions::NONE;
        for role in &roles {
            let role_id = parse_snowflake(&role.id)?;
            if role_id == guild_id || member.roles.iter().any(|r| r == &role.id) {
                perms |= parse_permissions(Some(&role.permissions))?;
            }
        }

        if perms.contains(Permissions::ADMINISTRATOR) {
            return Ok(Permissions(u64::MAX));
        }

        Ok(perms)
    }

    async fn current_user_id(&self) -> Result<UserId, ChatError> {
        if let Some(id) = *self.bot_user_id.read().await {
            return Ok(id);
        }

        let response = self
            .auth(self.client.get(self.url("/users/@me")))
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let user: WireUser = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        let id = parse_snowflake(&user.id)?;
        *self.bot_user_id.write().await = Some(id);
        Ok(id)
    }
}

#[async_trait]
impl TransferService for DiscordRestService {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ChatError> {
        // attachment URLs point at the CDN, no auth header
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        let bytes = Self::check_status(response)
            .await?
            .bytes()
            .await
            .map_err(ChatError::from_reqwest)?;

        Ok(bytes.to_vec())
    }

    async fn upload_file(
        &self,
        channel_id: ChannelId,
        filename: &str,
        data: Vec<u8>,
        message: Option<&str>,
    ) -> Result<(), ChatError> {
        let payload = json!({
            "content": message.unwrap_or_default(),
            "attachments": [{ "id": 0, "filename": filename }],
        });

        let form = reqwest::multipart::Form::new()
            .text("payload_json", payload.to_string())
            .part(
                "files[0]",
                reqwest::multipart::Part::bytes(data).file_name(filename.to_string()),
            );

        let response = self
            .auth(
                self.client
                    .post(self.url(&format!("/channels/{channel_id}/messages"))),
            )
            .multipart(form)
            .send()
            .await
            .map_err(ChatError::from_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }
}
