use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::Message;

use sqlx::Row;

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap()
}

fn message_from_row(row: &sqlx::any::AnyRow) -> EngineResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        seq: row.try_get("seq")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id").ok(),
        sender_kind: row.try_get("sender_kind")?,
        is_system: row.try_get::<i32, _>("is_system")? != 0,
        body: row.try_get("body")?,
        is_read: row.try_get::<i32, _>("is_read")? != 0,
        read_at: row.try_get("read_at").ok(),
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Append to the conversation's log. The store assigns `seq`, the
    /// stable tiebreak for equal `created_at` values; the returned message
    /// carries it.
    pub async fn append_message(&self, message: &Message) -> EngineResult<Message> {
        sqlx::query(
            "INSERT INTO messages (id, seq, conversation_id, sender_id, sender_kind, \
             is_system, body, is_read, read_at, created_at)
             VALUES (?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages), ?, ?, ?, ?, ?, 0, NULL, ?)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.sender_id)
        .bind(message.sender_kind.as_str())
        .bind(if message.is_system { 1 } else { 0 })
        .bind(&message.body)
        .bind(&message.created_at)
        .execute(&self.pool)
        .await?;

        self.get_message_by_id(&message.id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Message not found after append".to_string()))
    }

    pub async fn get_message_by_id(&self, id: &str) -> EngineResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, seq, conversation_id, sender_id, sender_kind, is_system, body, \
             is_read, read_at, created_at
             FROM messages
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(message_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Messages in insertion order. `seq` is assigned under the insert and
    /// increases monotonically, so it reproduces insertion order exactly —
    /// including for messages stamped within the same instant.
    pub async fn list_messages(&self, conversation_id: &str) -> EngineResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, seq, conversation_id, sender_id, sender_kind, is_system, body, \
             is_read, read_at, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(message_from_row(&row)?);
        }
        Ok(messages)
    }

    pub async fn count_messages(&self, conversation_id: &str) -> EngineResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Mark every visitor-authored unread message read. Idempotent: the
    /// predicate only matches unread rows, so a second call changes
    /// nothing and existing `read_at` stamps are preserved.
    pub async fn mark_read_by_admin(&self, conversation_id: &str) -> EngineResult<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET is_read = 1, read_at = ?
             WHERE conversation_id = ? AND sender_kind != 'admin' AND is_read = 0",
        )
        .bind(now_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Symmetric marking for the visitor side: admin-authored messages.
    pub async fn mark_read_by_visitor(&self, conversation_id: &str) -> EngineResult<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET is_read = 1, read_at = ?
             WHERE conversation_id = ? AND sender_kind = 'admin' AND is_read = 0",
        )
        .bind(now_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Unread visitor messages across every conversation the admin owns.
    /// Derived by aggregate query; there is no counter to drift.
    pub async fn unread_count_for_admin(&self, admin_id: &str) -> EngineResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count
             FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE c.owner_admin_id = ? AND m.sender_kind != 'admin' AND m.is_read = 0",
        )
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    /// Unread admin messages in one conversation, for the visitor's badge.
    pub async fn unread_count_for_visitor(&self, conversation_id: &str) -> EngineResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count
             FROM messages
             WHERE conversation_id = ? AND sender_kind = 'admin' AND is_read = 0",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }
}
