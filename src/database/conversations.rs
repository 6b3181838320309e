use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{Conversation, ConversationFilter, VisitorIdentity};

use sqlx::Row;

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap()
}

fn today_start_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .date()
        .midnight()
        .assume_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap()
}

fn conversation_from_row(row: &sqlx::any::AnyRow) -> EngineResult<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        status: row.try_get("status")?,
        visitor_user_id: row.try_get("visitor_user_id").ok(),
        guest_name: row.try_get("guest_name").ok(),
        guest_email: row.try_get("guest_email").ok(),
        owner_admin_id: row.try_get("owner_admin_id").ok(),
        last_activity_at: row.try_get("last_activity_at")?,
        closed_at: row.try_get("closed_at").ok(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, status, visitor_user_id, guest_name, guest_email, \
     owner_admin_id, last_activity_at, closed_at, created_at, updated_at";

impl Database {
    /// Create a conversation in `draft`: the widget is open but nothing has
    /// been sent yet.
    pub async fn create_conversation(
        &self,
        visitor: &VisitorIdentity,
    ) -> EngineResult<Conversation> {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        let (visitor_user_id, guest_name, guest_email) = match visitor {
            VisitorIdentity::Registered { user_id } => (Some(user_id.as_str()), None, None),
            VisitorIdentity::Guest { name, email } => {
                (None, Some(name.as_str()), email.as_deref())
            }
        };

        sqlx::query(
            "INSERT INTO conversations (id, status, visitor_user_id, guest_name, guest_email, \
             last_activity_at, created_at, updated_at)
             VALUES (?, 'draft', ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation_id)
        .bind(visitor_user_id)
        .bind(guest_name)
        .bind(guest_email)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!("Conversation created: id={}", conversation_id);

        self.get_conversation_by_id(&conversation_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Conversation not found after create".to_string()))
    }

    pub async fn get_conversation_by_id(&self, id: &str) -> EngineResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(conversation_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// First visitor message moves `draft` to `waiting`; a repeat call while
    /// already `waiting` is a no-op, as is any call once the conversation is
    /// `active` or `closed`.
    pub async fn mark_waiting_on_first_message(&self, id: &str) -> EngineResult<Conversation> {
        sqlx::query(
            "UPDATE conversations
             SET status = 'waiting', updated_at = ?
             WHERE id = ? AND status IN ('draft', 'waiting')",
        )
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_conversation_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Conversation {} not found", id)))
    }

    /// Atomic claim. The single conditional UPDATE is the whole
    /// check-then-set: the store's row lock serializes concurrent callers,
    /// so exactly one succeeds and the rest observe `false` with the live
    /// post-race state. Claimable while the row still satisfies
    /// `owner_admin_id IS NULL OR status = 'waiting'`.
    pub async fn compare_and_assign(
        &self,
        id: &str,
        admin_id: &str,
    ) -> EngineResult<(Conversation, bool)> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "UPDATE conversations
             SET owner_admin_id = ?, status = 'active', last_activity_at = ?, updated_at = ?
             WHERE id = ? AND (owner_admin_id IS NULL OR status = 'waiting')",
        )
        .bind(admin_id)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() > 0;

        let conversation = self
            .get_conversation_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Conversation {} not found", id)))?;

        if won {
            tracing::info!("Conversation {} assigned to admin {}", id, admin_id);
        } else {
            tracing::debug!(
                "Assignment of conversation {} to admin {} lost the race (owner: {:?})",
                id,
                admin_id,
                conversation.owner_admin_id
            );
        }

        Ok((conversation, won))
    }

    /// Close, owner only. Returns false when the precondition no longer
    /// holds (not the owner, already closed, never active) — no side
    /// effects in that case.
    pub async fn close_conversation(&self, id: &str, by_admin: &str) -> EngineResult<bool> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "UPDATE conversations
             SET status = 'closed', closed_at = ?, updated_at = ?
             WHERE id = ? AND owner_admin_id = ? AND status = 'active'",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .bind(by_admin)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change owner while staying `active`. Capability checks on the target
    /// belong to the workflow layer; here only the live ownership
    /// precondition is enforced.
    pub async fn transfer_owner(
        &self,
        id: &str,
        from_admin: &str,
        to_admin: &str,
    ) -> EngineResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations
             SET owner_admin_id = ?, updated_at = ?
             WHERE id = ? AND owner_admin_id = ? AND status = 'active'",
        )
        .bind(to_admin)
        .bind(now_rfc3339())
        .bind(id)
        .bind(from_admin)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reopen a closed conversation by assigning it a new owner. The
    /// waiting-queue claim predicate never matches closed rows, so this is
    /// the only path back to `active`.
    pub async fn reopen_conversation(&self, id: &str, admin_id: &str) -> EngineResult<bool> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "UPDATE conversations
             SET status = 'active', owner_admin_id = ?, closed_at = NULL, \
             last_activity_at = ?, updated_at = ?
             WHERE id = ? AND status = 'closed'",
        )
        .bind(admin_id)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_activity(&self, id: &str) -> EngineResult<()> {
        let now = now_rfc3339();

        sqlx::query(
            "UPDATE conversations
             SET last_activity_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Destructive removal, closed conversations only. The conditional
    /// DELETE enforces the precondition under the row lock; messages go in
    /// the same transaction.
    pub async fn delete_conversation(&self, id: &str, by_admin: &str) -> EngineResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM conversations
             WHERE id = ? AND owner_admin_id = ? AND status = 'closed'",
        )
        .bind(id)
        .bind(by_admin)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Conversation {} deleted by admin {}", id, by_admin);
        Ok(true)
    }

    pub async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> EngineResult<Vec<Conversation>> {
        let base = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE {} ORDER BY last_activity_at DESC",
            match filter {
                ConversationFilter::Waiting => "status = 'waiting'",
                ConversationFilter::Active => "status = 'active'",
                ConversationFilter::AssignedTo(_) =>
                    "owner_admin_id = ? AND status != 'closed'",
                ConversationFilter::All => "1=1",
            }
        );

        let mut query = sqlx::query(&base);
        if let ConversationFilter::AssignedTo(admin_id) = filter {
            query = query.bind(admin_id);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(conversation_from_row(&row)?);
        }
        Ok(conversations)
    }

    pub async fn find_waiting(&self) -> EngineResult<Vec<Conversation>> {
        self.list_conversations(&ConversationFilter::Waiting).await
    }

    pub async fn find_assigned_to(&self, admin_id: &str) -> EngineResult<Vec<Conversation>> {
        self.list_conversations(&ConversationFilter::AssignedTo(admin_id.to_string()))
            .await
    }

    pub async fn count_waiting(&self) -> EngineResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM conversations WHERE status = 'waiting'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    pub async fn count_active_for(&self, admin_id: &str) -> EngineResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM conversations
             WHERE owner_admin_id = ? AND status = 'active'",
        )
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    /// RFC 3339 strings compare lexicographically, so the midnight bound
    /// works as a plain string comparison.
    pub async fn count_closed_today_for(&self, admin_id: &str) -> EngineResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM conversations
             WHERE owner_admin_id = ? AND status = 'closed' AND closed_at >= ?",
        )
        .bind(admin_id)
        .bind(today_start_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }
}
