//! Channel history retrieval and transcript rendering.
//!
//! History is fetched newest-first in pages and rendered oldest-first as a
//! plain text document. Retrieval stops at [`MAX_MESSAGES`] so a runaway
//! channel cannot pin the process; the cut is recorded on the result.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::{Attachment, ChannelId, ChannelService, ChatError, Message};
use crate::metrics;
use crate::ticket::Ticket;

/// Messages fetched per history page.
pub const PAGE_SIZE: u8 = 100;

/// Hard cap on messages collected for a single transcript.
pub const MAX_MESSAGES: usize = 100_000;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("history fetch failed: {0}")]
    Fetch(#[from] ChatError),
}

/// Collected channel history, newest message first.
#[derive(Debug, Default)]
pub struct History {
    pub messages: Vec<Message>,
    /// Attachments in the order they were encountered during the fetch.
    pub attachments: Vec<Attachment>,
    /// True if collection stopped at [`MAX_MESSAGES`].
    pub truncated: bool,
}

pub struct TranscriptBuilder {
    channels: Arc<dyn ChannelService>,
}

impl TranscriptBuilder {
    pub fn new(channels: Arc<dyn ChannelService>) -> Self {
        Self { channels }
    }

    /// Fetch the full history of a channel, paging backwards from the most
    /// recent message until the channel is exhausted or the cap is hit.
    pub async fn collect(&self, channel_id: ChannelId) -> Result<History, TranscriptError> {
        let mut history = History::default();
        let mut before = None;

        loop {
            let page = self
                .channels
                .fetch_messages(channel_id, PAGE_SIZE, before)
                .await?;
            let page_len = page.len();

            for message in page {
                history.attachments.extend(message.attachments.iter().cloned());
                history.messages.push(message);
            }

            if history.messages.len() >= MAX_MESSAGES {
                warn!(channel = channel_id, "message cap reached, truncating transcript");
                metrics::TRANSCRIPT_TRUNCATIONS.inc();
                history.truncated = true;
                break;
            }

            if page_len < PAGE_SIZE as usize {
                break;
            }

            before = history.messages.last().map(|m| m.id);
        }

        debug!(
            channel = channel_id,
            messages = history.messages.len(),
            attachments = history.attachments.len(),
            "collected channel history"
        );
        metrics::TRANSCRIPT_MESSAGES.observe(history.messages.len() as f64);

        Ok(history)
    }
}

/// Render a collected history as a plain text transcript, oldest message
/// first. Embeds are serialized as JSON and appended to the line of the
/// message that carried them.
pub fn render_transcript(ticket: &Ticket, history: &History) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Transcript of ticket #{} - {}, opened by {} at {}",
        ticket.local_id,
        ticket.title,
        ticket.author_display_name,
        ticket.created_at.format("%Y %b %d %H:%M:%S"),
    ));
    if let Some(closed_at) = ticket.closed_at {
        out.push_str(&format!(
            ", closed at {}",
            closed_at.format("%Y %b %d %H:%M:%S")
        ));
    }
    out.push_str(".\n\n");

    for message in history.messages.iter().rev() {
        out.push_str(&format!(
            "[{}] {}: {}",
            message.timestamp.format("%Y %b %d %H:%M:%S"),
            message.author.name,
            message.content,
        ));

        for attachment in &message.attachments {
            out.push_str(&format!(" (attachment: {})", attachment.filename));
        }

        for embed in &message.embeds {
            if let Ok(json) = serde_json::to_string(embed) {
                if !message.content.is_empty() {
                    out.push_str(", ");
                }
                out.push_str(&json);
            }
        }

        out.push('\n');
    }

    if history.truncated {
        out.push_str("\n[transcript truncated]\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::chat::MessageAuthor;
    use crate::testing::MockChannelService;

    fn message(id: u64, content: &str) -> Message {
        Message {
            id,
            author: MessageAuthor {
                id: 7,
                name: "alice".to_string(),
            },
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, id as u32 % 60).unwrap(),
            attachments: vec![],
            embeds: vec![],
        }
    }

    fn sample_ticket() -> Ticket {
        Ticket {
            guild_id: 1,
            local_id: 3,
            channel_id: 10,
            title: "printer".to_string(),
            question: "it is on fire".to_string(),
            author_id: 7,
            author_display_name: "alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
            closed_at: None,
            logs: None,
        }
    }

    #[tokio::test]
    async fn test_collect_pages_until_exhausted() {
        let channels = Arc::new(MockChannelService::new());
        // 250 messages, ids 1..=250, id 250 newest
        channels
            .seed_history(10, (1..=250).map(|id| message(id, "hi")).collect())
            .await;

        let builder = TranscriptBuilder::new(channels);
        let history = builder.collect(10).await.unwrap();

        assert_eq!(history.messages.len(), 250);
        assert!(!history.truncated);
        // newest first
        assert_eq!(history.messages.first().unwrap().id, 250);
        assert_eq!(history.messages.last().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_collect_propagates_fetch_failure() {
        let channels = Arc::new(MockChannelService::new());
        channels.fail_next_fetch().await;

        let builder = TranscriptBuilder::new(channels);
        let err = builder.collect(10).await.unwrap_err();
        assert!(matches!(err, TranscriptError::Fetch(_)));
    }

    #[test]
    fn test_render_is_oldest_first() {
        let history = History {
            // collection order, newest first
            messages: vec![message(2, "second"), message(1, "first")],
            attachments: vec![],
            truncated: false,
        };

        let text = render_transcript(&sample_ticket(), &history);
        let first = text.find("first").unwrap();
        let second = text.find("second").unwrap();
        assert!(first < second);
        assert!(text.starts_with("Transcript of ticket #3 - printer, opened by alice"));
    }

    #[test]
    fn test_render_appends_embeds_and_attachments() {
        let mut m = message(1, "look");
        m.embeds.push(json!({"title": "evidence"}));
        m.attachments.push(Attachment {
            filename: "proof.png".to_string(),
            size_bytes: 10,
            url: "https://cdn.example/proof.png".to_string(),
        });

        let history = History {
            messages: vec![m],
            attachments: vec![],
            truncated: false,
        };

        let text = render_transcript(&sample_ticket(), &history);
        assert!(text.contains("look (attachment: proof.png), {\"title\":\"evidence\"}"));
    }

    #[test]
    fn test_render_embed_without_content_has_no_separator() {
        let mut m = message(1, "");
        m.embeds.push(json!({"title": "bare"}));

        let history = History {
            messages: vec![m],
            attachments: vec![],
            truncated: false,
        };

        let text = render_transcript(&sample_ticket(), &history);
        assert!(text.contains("alice: {\"title\":\"bare\"}"));
    }

    #[test]
    fn test_render_marks_truncation() {
        let history = History {
            messages: vec![message(1, "only")],
            attachments: vec![],
            truncated: true,
        };

        let text = render_transcript(&sample_ticket(), &history);
        assert!(text.ends_with("[transcript truncated]\n"));
    }
}
