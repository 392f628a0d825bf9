//! End to end lifecycle tests over the mock chat platform and an in-memory
//! store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use helpdesk_core::chat::{Attachment, Channel, Message, MessageAuthor};
use helpdesk_core::lifecycle::{CloseError, TicketLifecycle};
use helpdesk_core::provision::{OpenError, OpenRequest, MAX_OPEN_TICKETS};
use helpdesk_core::testing::{MockChannelService, MockTransferService};
use helpdesk_core::ticket::{GuildTicketConfig, SqliteTicketStore, TicketStore};

const GUILD: u64 = 1;
const CATEGORY: u64 = 500;
const TRANSCRIPTS: u64 = 600;
const STATUS: u64 = 700;
const AUTHOR: u64 = 7;
const MOD_ROLE: u64 = 20;

struct TestHarness {
    channels: Arc<MockChannelService>,
    transfer: Arc<MockTransferService>,
    store: Arc<SqliteTicketStore>,
    lifecycle: TicketLifecycle,
}

impl TestHarness {
    async fn new(config: GuildTicketConfig) -> Self {
        let channels = Arc::new(MockChannelService::new());
        let transfer = Arc::new(MockTransferService::new());
        let store = Arc::new(SqliteTicketStore::in_memory().unwrap());

        channels
            .seed_channel(Channel {
                id: CATEGORY,
                guild_id: GUILD,
                name: "tickets".to_string(),
                parent_id: None,
                overwrites: vec![],
            })
            .await;

        let lifecycle = TicketLifecycle::new(channels.clone(), transfer.clone(), store.clone());
        lifecycle.save_guild_config(GUILD, &config).await.unwrap();

        Self {
            channels,
            transfer,
            store,
            lifecycle,
        }
    }

    fn config() -> GuildTicketConfig {
        GuildTicketConfig {
            enabled: true,
            ticket_category: Some(CATEGORY),
            mod_roles: vec![MOD_ROLE],
            transcripts_channel: Some(TRANSCRIPTS),
            use_text_transcripts: true,
            download_attachments: true,
            status_channel: Some(STATUS),
            ..Default::default()
        }
    }

    fn request() -> OpenRequest {
        OpenRequest {
            author_id: AUTHOR,
            author_display_name: "alice".to_string(),
            title: "printer".to_string(),
            question: "it is on fire".to_string(),
        }
    }

    fn message(id: u64, content: &str) -> Message {
        Message {
            id,
            author: MessageAuthor {
                id: AUTHOR,
                name: "alice".to_string(),
            },
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, (id % 60) as u32).unwrap(),
            attachments: vec![],
            embeds: vec![],
        }
    }
}

#[tokio::test]
async fn test_open_persists_ticket_and_greets() {
    let h = TestHarness::new(TestHarness::config()).await;

    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();
    assert_eq!(ticket.local_id, 1);

    let created = h.channels.created_channels().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "ticket-0001");
    assert_eq!(created[0].parent_id, Some(CATEGORY));

    let persisted = h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap();
    assert!(persisted.is_open());

    let sent = h.channels.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ticket.channel_id);
    assert!(sent[0].1.contains("alice"));
}

#[tokio::test]
async fn test_open_rejected_when_disabled() {
    let mut config = TestHarness::config();
    config.enabled = false;
    let h = TestHarness::new(config).await;

    let rejected_before = helpdesk_core::metrics::TICKETS_OPENED
        .with_label_values(&["rejected"])
        .get();

    let err = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap_err();
    assert!(matches!(err, OpenError::Disabled));
    assert!(h.channels.created_channels().await.is_empty());

    let rejected_after = helpdesk_core::metrics::TICKETS_OPENED
        .with_label_values(&["rejected"])
        .get();
    assert!(rejected_after > rejected_before);
}

#[tokio::test]
async fn test_fourth_open_rejected_without_side_effects() {
    let h = TestHarness::new(TestHarness::config()).await;

    for _ in 0..MAX_OPEN_TICKETS {
        h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();
    }

    let before = h.channels.created_channels().await.len();
    let err = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap_err();
    assert!(matches!(err, OpenError::MaxOpenTickets));
    assert_eq!(h.channels.created_channels().await.len(), before);
}

#[tokio::test]
async fn test_full_close_uploads_transcript_and_archive() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    let mut first = TestHarness::message(1, "my printer caught fire");
    first.attachments.push(Attachment {
        filename: "flames.png".to_string(),
        size_bytes: 10_000_000,
        url: "https://cdn.example/flames.png".to_string(),
    });
    let mut second = TestHarness::message(2, "here is another angle");
    second.attachments.push(Attachment {
        filename: "smoke.png".to_string(),
        size_bytes: 10_000_000,
        url: "https://cdn.example/smoke.png".to_string(),
    });
    h.channels
        .seed_history(ticket.channel_id, vec![first, second])
        .await;
    h.transfer
        .seed_download("https://cdn.example/flames.png", b"flames".to_vec())
        .await;
    h.transfer
        .seed_download("https://cdn.example/smoke.png", b"smoke".to_vec())
        .await;

    let outcome = h.lifecycle.close(GUILD, ticket.channel_id).await.unwrap();
    assert_eq!(outcome.messages, 2);
    assert!(outcome.transcript_uploaded);
    assert_eq!(outcome.archive.uploads, 1);
    assert_eq!(outcome.archive.files_archived, 2);

    let uploads = h.transfer.uploads().await;
    assert_eq!(uploads.len(), 2);

    // transcript first, oldest message first
    assert_eq!(uploads[0].channel_id, TRANSCRIPTS);
    assert_eq!(uploads[0].filename, "transcript-1-printer.txt");
    let transcript = String::from_utf8(uploads[0].data.clone()).unwrap();
    let fire = transcript.find("caught fire").unwrap();
    let angle = transcript.find("another angle").unwrap();
    assert!(fire < angle);

    // both attachments share one zip
    assert_eq!(uploads[1].filename, "attachments-1-printer.zip");

    // the channel is gone and the ticket is closed with its logs
    assert_eq!(h.channels.deleted_channels().await, vec![ticket.channel_id]);
    let closed = h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!closed.is_open());
    assert!(closed.logs.unwrap().contains("caught fire"));

    // and the status channel heard about it, naming the author
    let sent = h.channels.sent_messages().await;
    assert!(sent.iter().any(|(channel, text)| *channel == STATUS
        && text.contains("Ticket #1")
        && text.contains("author alice")));
}

#[tokio::test]
async fn test_close_non_ticket_channel_rejected() {
    let h = TestHarness::new(TestHarness::config()).await;

    let err = h.lifecycle.close(GUILD, 12345).await.unwrap_err();
    assert!(matches!(err, CloseError::NotATicket));
    assert!(h.channels.deleted_channels().await.is_empty());
}

#[tokio::test]
async fn test_close_rejected_while_another_close_holds_the_guard() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    let guard = h.lifecycle.close_guard();
    let _permit = guard.try_acquire(ticket.channel_id).unwrap();

    let err = h.lifecycle.close(GUILD, ticket.channel_id).await.unwrap_err();
    assert!(matches!(err, CloseError::AlreadyClosing));
    assert!(h.channels.deleted_channels().await.is_empty());
    assert!(h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap()
        .is_open());
}

#[tokio::test]
async fn test_history_fetch_failure_closes_without_transcript() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    h.channels.fail_next_fetch().await;

    let outcome = h.lifecycle.close(GUILD, ticket.channel_id).await.unwrap();
    assert_eq!(outcome.messages, 0);
    assert!(!outcome.transcript_uploaded);
    assert!(h.transfer.uploads().await.is_empty());

    let closed = h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!closed.is_open());
    assert!(closed.logs.is_none());
}

#[tokio::test]
async fn test_failed_channel_delete_keeps_ticket_open() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    h.channels.fail_next_delete().await;
    let err = h.lifecycle.close(GUILD, ticket.channel_id).await.unwrap_err();
    assert!(matches!(err, CloseError::Chat(_)));
    assert!(h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap()
        .is_open());

    // the retry goes through
    h.lifecycle.close(GUILD, ticket.channel_id).await.unwrap();
    assert!(!h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .unwrap()
        .is_open());
}

#[tokio::test]
async fn test_add_participant_grants_access_once() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    let added = h
        .lifecycle
        .add_participant(GUILD, ticket.channel_id, 42)
        .await
        .unwrap();
    assert!(added);
    assert_eq!(h.channels.permission_edits().await.len(), 1);

    // the overwrite is now on the channel, the second add is a no-op
    let added_again = h
        .lifecycle
        .add_participant(GUILD, ticket.channel_id, 42)
        .await
        .unwrap();
    assert!(!added_again);
    assert_eq!(h.channels.permission_edits().await.len(), 1);
}

#[tokio::test]
async fn test_channel_deleted_event_removes_ticket() {
    let h = TestHarness::new(TestHarness::config()).await;
    let ticket = h.lifecycle.open(GUILD, TestHarness::request()).await.unwrap();

    let removed = h
        .lifecycle
        .handle_channel_deleted(GUILD, ticket.channel_id)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(h
        .store
        .get_by_channel(GUILD, ticket.channel_id)
        .await
        .unwrap()
        .is_none());

    // a second event for the same channel is a no-op
    let removed = h
        .lifecycle
        .handle_channel_deleted(GUILD, ticket.channel_id)
        .await
        .unwrap();
    assert_eq!(removed, 0);
}
