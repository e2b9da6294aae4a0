use crate::{
    chat::{ChatMessage, Conversation, ConversationSummary, Mode, SenderKind},
    content::{Card, CardKind, Experience, Profile, Project, Skill},
    entity::Identity,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    ConnectOptions, Row, SqlitePool,
};
use std::{path::Path, str::FromStr};

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// A private in-memory database. One connection, kept forever, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE,
                display_name TEXT,
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_tokens (
                token_hash TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL REFERENCES identities(id),
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                visitor_id TEXT NOT NULL REFERENCES identities(id),
                assigned_operator TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                last_seen_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_visitor ON conversations(visitor_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_seq ON messages(conversation_id, seq);

            CREATE TABLE IF NOT EXISTS profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                name TEXT NOT NULL,
                headline TEXT NOT NULL,
                summary TEXT NOT NULL,
                location TEXT,
                avatar_url TEXT
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                tech TEXT NOT NULL DEFAULT '[]',
                url TEXT
            );

            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                level INTEGER
            );

            CREATE TABLE IF NOT EXISTS experiences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                period TEXT NOT NULL,
                summary TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_cards_kind ON cards(kind, position);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Identities and tokens
    // ---------------------------------------------------------------------

    pub async fn create_identity(&self, identity: &Identity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO identities (id, email, display_name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.email)
        .bind(&identity.display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create identity")?;

        Ok(())
    }

    pub async fn get_identity(&self, id: &str) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT id, email, display_name FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch identity")?;

        row.map(|r| identity_from_row(&r)).transpose()
    }

    pub async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT id, email, display_name FROM identities WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up identity by email")?;

        row.map(|r| identity_from_row(&r)).transpose()
    }

    pub async fn set_display_name(&self, identity_id: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE identities SET display_name = ? WHERE id = ?")
            .bind(name)
            .bind(identity_id)
            .execute(&self.pool)
            .await
            .context("Failed to update display name")?;

        Ok(())
    }

    pub async fn insert_token(&self, token_hash: &str, identity_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO auth_tokens (token_hash, identity_id, created_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(identity_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to store auth token")?;

        Ok(())
    }

    pub async fn identity_for_token(&self, token_hash: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(
            r#"
            SELECT i.id, i.email, i.display_name
            FROM auth_tokens t
            JOIN identities i ON i.id = t.identity_id
            WHERE t.token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to resolve auth token")?;

        row.map(|r| identity_from_row(&r)).transpose()
    }

    pub async fn delete_token(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .context("Failed to revoke auth token")?;

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Conversations
    // ---------------------------------------------------------------------

    pub async fn create_conversation(&self, conv: &Conversation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, visitor_id, assigned_operator, created_at, updated_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conv.id)
        .bind(&conv.visitor_id)
        .bind(&conv.assigned_operator)
        .bind(conv.created_at)
        .bind(conv.updated_at)
        .bind(conv.last_seen_at)
        .execute(&self.pool)
        .await
        .context("Failed to create conversation")?;

        Ok(())
    }

    /// The visitor's latest conversation, inserting `fresh` only if they have
    /// none yet. The guarded insert is one statement, so it holds the write
    /// lock for both the check and the insert. Returns true if `fresh` was used.
    pub async fn latest_or_create_conversation(&self, fresh: &Conversation) -> Result<(Conversation, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (id, visitor_id, assigned_operator, created_at, updated_at, last_seen_at)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM conversations WHERE visitor_id = ?)
            "#,
        )
        .bind(&fresh.id)
        .bind(&fresh.visitor_id)
        .bind(&fresh.assigned_operator)
        .bind(fresh.created_at)
        .bind(fresh.updated_at)
        .bind(fresh.last_seen_at)
        .bind(&fresh.visitor_id)
        .execute(&self.pool)
        .await
        .context("Failed to create conversation")?;

        let conversation = self
            .latest_conversation(&fresh.visitor_id)
            .await?
            .context("Conversation missing after guarded insert")?;
        Ok((conversation, result.rows_affected() == 1))
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, visitor_id, assigned_operator, created_at, updated_at, last_seen_at
            FROM conversations WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversation")?;

        row.map(|r| conversation_from_row(&r)).transpose()
    }

    /// The visitor's current conversation: the most recently created one.
    pub async fn latest_conversation(&self, visitor_id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, visitor_id, assigned_operator, created_at, updated_at, last_seen_at
            FROM conversations
            WHERE visitor_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest conversation")?;

        row.map(|r| conversation_from_row(&r)).transpose()
    }

    /// Assign or clear the operator. Returns false if the conversation does not exist.
    pub async fn set_operator(&self, conversation_id: &str, operator_id: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET assigned_operator = ?, updated_at = ? WHERE id = ?",
        )
        .bind(operator_id)
        .bind(Utc::now())
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .context("Failed to update conversation mode")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_seen(&self, conversation_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE conversations SET last_seen_at = ? WHERE id = ?")
            .bind(at)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .context("Failed to record conversation activity")?;

        Ok(result.rows_affected() > 0)
    }

    /// Inbox view, most recently active first. `online` is left false; the
    /// store knows nothing about open tabs.
    pub async fn list_conversation_summaries(&self) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.visitor_id, c.assigned_operator, c.updated_at,
                   i.display_name,
                   (SELECT COUNT(*) FROM messages WHERE conversation_id = c.id) AS message_count,
                   m.id AS last_id, m.sender AS last_sender, m.content AS last_content,
                   m.created_at AS last_created_at
            FROM conversations c
            LEFT JOIN identities i ON i.id = c.visitor_id
            LEFT JOIN messages m
                ON m.seq = (SELECT MAX(seq) FROM messages WHERE conversation_id = c.id)
            ORDER BY c.updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list conversations")?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let assigned_operator: Option<String> = row.try_get("assigned_operator")?;
            let last_id: Option<String> = row.try_get("last_id")?;

            let last_message = match last_id {
                Some(last_id) => {
                    let sender: String = row.try_get("last_sender")?;
                    Some(ChatMessage {
                        id: last_id,
                        conversation_id: id.clone(),
                        sender: sender.parse()?,
                        content: row.try_get("last_content")?,
                        created_at: row.try_get("last_created_at")?,
                    })
                }
                None => None,
            };

            summaries.push(ConversationSummary {
                id,
                visitor_id: row.try_get("visitor_id")?,
                visitor_name: row.try_get("display_name")?,
                mode: Mode::from_operator(assigned_operator.as_deref()),
                online: false,
                message_count: row.try_get("message_count")?,
                last_message,
                updated_at: row.try_get("updated_at")?,
            });
        }

        Ok(summaries)
    }

    // ---------------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------------

    /// Append a message and bump the conversation's activity timestamp.
    pub async fn append_message(&self, msg: &ChatMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        insert_message(&mut tx, msg).await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(msg.created_at)
            .bind(&msg.conversation_id)
            .execute(&mut *tx)
            .await
            .context("Failed to bump conversation activity")?;

        tx.commit().await.context("Failed to commit message")?;
        Ok(())
    }

    /// Append an operator message, assigning the operator first if the
    /// conversation is still automated. Both writes commit together or not at
    /// all. Returns true when the mode flipped.
    pub async fn append_operator_message(&self, msg: &ChatMessage, operator_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let current: Option<Option<String>> =
            sqlx::query_scalar("SELECT assigned_operator FROM conversations WHERE id = ?")
                .bind(&msg.conversation_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to read conversation mode")?;

        let Some(current) = current else {
            anyhow::bail!("conversation {} does not exist", msg.conversation_id);
        };

        let flipped = current.is_none();
        if flipped {
            sqlx::query("UPDATE conversations SET assigned_operator = ? WHERE id = ?")
                .bind(operator_id)
                .bind(&msg.conversation_id)
                .execute(&mut *tx)
                .await
                .context("Failed to assign operator")?;
        }

        insert_message(&mut tx, msg).await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(msg.created_at)
            .bind(&msg.conversation_id)
            .execute(&mut *tx)
            .await
            .context("Failed to bump conversation activity")?;

        tx.commit().await.context("Failed to commit operator message")?;
        Ok(flipped)
    }

    /// The last `limit` messages of a conversation.
    /// Returns messages in insertion order (oldest to newest).
    pub async fn recent_messages(&self, conversation_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, content, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chat history")?;

        let mut messages = rows.iter().map(message_from_row).collect::<Result<Vec<_>>>()?;
        messages.reverse();

        Ok(messages)
    }

    pub async fn all_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, content, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch conversation messages")?;

        rows.iter().map(message_from_row).collect()
    }

    // ---------------------------------------------------------------------
    // Portfolio content
    // ---------------------------------------------------------------------

    pub async fn profile(&self) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT name, headline, summary, location, avatar_url FROM profile WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch profile")?;

        row.map(|r| -> Result<Profile> {
            Ok(Profile {
                name: r.try_get("name")?,
                headline: r.try_get("headline")?,
                summary: r.try_get("summary")?,
                location: r.try_get("location")?,
                avatar_url: r.try_get("avatar_url")?,
            })
        })
        .transpose()
    }

    pub async fn save_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profile (id, name, headline, summary, location, avatar_url)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                headline = excluded.headline,
                summary = excluded.summary,
                location = excluded.location,
                avatar_url = excluded.avatar_url
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.headline)
        .bind(&profile.summary)
        .bind(&profile.location)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await
        .context("Failed to save profile")?;

        Ok(())
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT id, title, description, tech, url FROM projects ORDER BY position, rowid")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch projects")?;

        rows.iter()
            .map(|r| {
                let tech: String = r.try_get("tech")?;
                Ok(Project {
                    id: r.try_get("id")?,
                    title: r.try_get("title")?,
                    description: r.try_get("description")?,
                    tech: serde_json::from_str(&tech).context("Malformed project tech list")?,
                    url: r.try_get("url")?,
                })
            })
            .collect()
    }

    pub async fn add_project(&self, project: &Project, position: i64) -> Result<()> {
        sqlx::query("INSERT INTO projects (id, position, title, description, tech, url) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&project.id)
            .bind(position)
            .bind(&project.title)
            .bind(&project.description)
            .bind(serde_json::to_string(&project.tech)?)
            .bind(&project.url)
            .execute(&self.pool)
            .await
            .context("Failed to save project")?;

        Ok(())
    }

    pub async fn skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT name, category, level FROM skills ORDER BY position, id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch skills")?;

        rows.iter()
            .map(|r| {
                Ok(Skill {
                    name: r.try_get("name")?,
                    category: r.try_get("category")?,
                    level: r.try_get("level")?,
                })
            })
            .collect()
    }

    pub async fn add_skill(&self, skill: &Skill, position: i64) -> Result<()> {
        sqlx::query("INSERT INTO skills (position, name, category, level) VALUES (?, ?, ?, ?)")
            .bind(position)
            .bind(&skill.name)
            .bind(&skill.category)
            .bind(skill.level)
            .execute(&self.pool)
            .await
            .context("Failed to save skill")?;

        Ok(())
    }

    pub async fn experiences(&self) -> Result<Vec<Experience>> {
        let rows = sqlx::query("SELECT company, role, period, summary FROM experiences ORDER BY position, id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch experiences")?;

        rows.iter()
            .map(|r| {
                Ok(Experience {
                    company: r.try_get("company")?,
                    role: r.try_get("role")?,
                    period: r.try_get("period")?,
                    summary: r.try_get("summary")?,
                })
            })
            .collect()
    }

    pub async fn add_experience(&self, experience: &Experience, position: i64) -> Result<()> {
        sqlx::query("INSERT INTO experiences (position, company, role, period, summary) VALUES (?, ?, ?, ?, ?)")
            .bind(position)
            .bind(&experience.company)
            .bind(&experience.role)
            .bind(&experience.period)
            .bind(&experience.summary)
            .execute(&self.pool)
            .await
            .context("Failed to save experience")?;

        Ok(())
    }

    pub async fn cards(&self, kind: CardKind) -> Result<Vec<Card>> {
        let rows = sqlx::query("SELECT title, description, icon FROM cards WHERE kind = ? ORDER BY position, id")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch cards")?;

        rows.iter()
            .map(|r| {
                Ok(Card {
                    title: r.try_get("title")?,
                    description: r.try_get("description")?,
                    icon: r.try_get("icon")?,
                })
            })
            .collect()
    }

    pub async fn add_card(&self, kind: CardKind, card: &Card, position: i64) -> Result<()> {
        sqlx::query("INSERT INTO cards (kind, position, title, description, icon) VALUES (?, ?, ?, ?, ?)")
            .bind(kind.as_str())
            .bind(position)
            .bind(&card.title)
            .bind(&card.description)
            .bind(&card.icon)
            .execute(&self.pool)
            .await
            .context("Failed to save card")?;

        Ok(())
    }
}

async fn insert_message(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, msg: &ChatMessage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, sender, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&msg.id)
    .bind(&msg.conversation_id)
    .bind(msg.sender.as_str())
    .bind(&msg.content)
    .bind(msg.created_at)
    .execute(&mut **tx)
    .await
    .context("Failed to save message")?;

    Ok(())
}

fn identity_from_row(row: &SqliteRow) -> Result<Identity> {
    Ok(Identity {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        visitor_id: row.try_get("visitor_id")?,
        assigned_operator: row.try_get("assigned_operator")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage> {
    let sender: String = row.try_get("sender")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: SenderKind::from_str(&sender)?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}
