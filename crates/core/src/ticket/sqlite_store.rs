//! SQLite implementation of [`TicketStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::chat::{ChannelId, GuildId, UserId};

use super::store::{StoreError, TicketStore};
use super::types::{GuildTicketConfig, Ticket, TicketParticipant};

pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                guild_id INTEGER NOT NULL,
                local_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                question TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                author_display_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                closed_at TEXT,
                logs TEXT,
                PRIMARY KEY (guild_id, local_id)
            );
            CREATE INDEX IF NOT EXISTS idx_tickets_channel ON tickets (guild_id, channel_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_author ON tickets (guild_id, author_id);

            CREATE TABLE IF NOT EXISTS ticket_participants (
                guild_id INTEGER NOT NULL,
                local_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (guild_id, local_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS local_ids (
                guild_id INTEGER NOT NULL,
                namespace TEXT NOT NULL,
                last_id INTEGER NOT NULL,
                PRIMARY KEY (guild_id, namespace)
            );

            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_ticket(row: &Row<'_>) -> Result<Ticket, rusqlite::Error> {
        let created_at: String = row.get("created_at")?;
        let closed_at: Option<String> = row.get("closed_at")?;

        let parse = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        };

        Ok(Ticket {
            guild_id: row.get::<_, i64>("guild_id")? as GuildId,
            local_id: row.get("local_id")?,
            channel_id: row.get::<_, i64>("channel_id")? as ChannelId,
            title: row.get("title")?,
            question: row.get("question")?,
            author_id: row.get::<_, i64>("author_id")? as UserId,
            author_display_name: row.get("author_display_name")?,
            created_at: parse(&created_at)?,
            closed_at: closed_at.as_deref().map(parse).transpose()?,
            logs: row.get("logs")?,
        })
    }
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn next_local_id(&self, guild_id: GuildId, namespace: &str) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "INSERT INTO local_ids (guild_id, namespace, last_id) VALUES (?1, ?2, 1)
             ON CONFLICT (guild_id, namespace) DO UPDATE SET last_id = last_id + 1
             RETURNING last_id",
            params![guild_id as i64, namespace],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tickets (guild_id, local_id, channel_id, title, question,
                                  author_id, author_display_name, created_at, closed_at, logs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                ticket.guild_id as i64,
                ticket.local_id,
                ticket.channel_id as i64,
                ticket.title,
                ticket.question,
                ticket.author_id as i64,
                ticket.author_display_name,
                ticket.created_at.to_rfc3339(),
                ticket.closed_at.map(|t| t.to_rfc3339()),
                ticket.logs,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM tickets WHERE guild_id = ?1 AND channel_id = ?2",
            params![guild_id as i64, channel_id as i64],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn find_open_tickets(
        &self,
        guild_id: GuildId,
        author_id: UserId,
    ) -> Result<Vec<Ticket>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM tickets
                 WHERE guild_id = ?1 AND author_id = ?2 AND closed_at IS NULL
                 ORDER BY local_id",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let tickets = stmt
            .query_map(params![guild_id as i64, author_id as i64], Self::row_to_ticket)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(tickets)
    }

    async fn close_ticket(
        &self,
        guild_id: GuildId,
        local_id: i64,
        closed_at: DateTime<Utc>,
        logs: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE tickets SET closed_at = ?3, logs = ?4
                 WHERE guild_id = ?1 AND local_id = ?2",
                params![guild_id as i64, local_id, closed_at.to_rfc3339(), logs],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<u64, StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "DELETE FROM ticket_participants
             WHERE guild_id = ?1 AND local_id IN (
                 SELECT local_id FROM tickets WHERE guild_id = ?1 AND channel_id = ?2
             )",
            params![guild_id as i64, channel_id as i64],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let deleted = conn
            .execute(
                "DELETE FROM tickets WHERE guild_id = ?1 AND channel_id = ?2",
                params![guild_id as i64, channel_id as i64],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(deleted as u64)
    }

    async fn add_participant(&self, participant: &TicketParticipant) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO ticket_participants (guild_id, local_id, user_id)
             VALUES (?1, ?2, ?3)",
            params![
                participant.ticket_guild_id as i64,
                participant.ticket_local_id,
                participant.user_id as i64,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn participants(
        &self,
        guild_id: GuildId,
        local_id: i64,
    ) -> Result<Vec<TicketParticipant>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id FROM ticket_participants
                 WHERE guild_id = ?1 AND local_id = ?2 ORDER BY user_id",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let participants = stmt
            .query_map(params![guild_id as i64, local_id], |row| {
                Ok(TicketParticipant {
                    ticket_guild_id: guild_id,
                    ticket_local_id: local_id,
                    user_id: row.get::<_, i64>(0)? as UserId,
                })
            })
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(participants)
    }

    async fn guild_config(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<GuildTicketConfig>, StoreError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT config FROM guild_configs WHERE guild_id = ?1",
                params![guild_id as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| StoreError::Database(e.to_string()))
        })
        .transpose()
    }

    async fn save_guild_config(
        &self,
        guild_id: GuildId,
        config: &GuildTicketConfig,
    ) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(config).map_err(|e| StoreError::Database(e.to_string()))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO guild_configs (guild_id, config) VALUES (?1, ?2)
             ON CONFLICT (guild_id) DO UPDATE SET config = ?2",
            params![guild_id as i64, json],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
